use super::*;

// April 2024 has 30 days.
fn april_2024() -> AppState {
    let mut state = AppState::new(3, 2024);
    state.initialize_if_empty();
    state
}

fn complete_days(state: &mut AppState, habit_index: usize, days: impl IntoIterator<Item = u32>) {
    for day in days {
        state.toggle_completion(habit_index, day);
    }
}

#[test]
fn test_streaks() {
    let mut state = april_2024();
    state.set_habit(0, "Run", Category::Health);
    complete_days(&mut state, 0, [1, 2, 3, 5, 6, 7, 8, 30]);

    let snapshot = compute_analytics(&state);
    let stats = &snapshot.habit_stats[0];

    assert_eq!(snapshot.days_in_month, 30);
    assert_eq!(stats.completed, 8);
    assert_eq!(stats.longest_streak, 4);
    assert_eq!(stats.current_streak, 1);
    assert_eq!(stats.missed, 22);
}

#[test]
fn test_current_streak_zero_when_month_end_missed() {
    let mut state = april_2024();
    state.set_habit(0, "Run", Category::Health);
    complete_days(&mut state, 0, 1..=20);

    let stats = &compute_analytics(&state).habit_stats[0];
    assert_eq!(stats.longest_streak, 20);
    assert_eq!(stats.current_streak, 0);
}

#[test]
fn test_completion_rate_tier_boundary() {
    let mut state = april_2024();
    state.set_habit(0, "Read", Category::Study);
    state.set_habit(1, "Write", Category::Work);
    complete_days(&mut state, 0, 1..=24);
    complete_days(&mut state, 1, 1..=23);

    let snapshot = compute_analytics(&state);
    let read = &snapshot.habit_stats[0];
    let write = &snapshot.habit_stats[1];

    assert_eq!(read.completion_rate, 80.0);
    assert_eq!(read.tier(), PerformanceTier::Excellent);
    assert!((write.completion_rate - 76.666_666).abs() < 0.001);
    assert_eq!(write.tier(), PerformanceTier::Good);
}

#[test]
fn test_tier_lower_bounds_are_inclusive() {
    assert_eq!(PerformanceTier::from_rate(100.0), PerformanceTier::Excellent);
    assert_eq!(PerformanceTier::from_rate(79.99), PerformanceTier::Good);
    assert_eq!(PerformanceTier::from_rate(60.0), PerformanceTier::Good);
    assert_eq!(PerformanceTier::from_rate(40.0), PerformanceTier::Average);
    assert_eq!(PerformanceTier::from_rate(39.9), PerformanceTier::Poor);
    assert_eq!(PerformanceTier::from_rate(0.0), PerformanceTier::Poor);
    assert_eq!(PerformanceTier::Poor.color(), "#DC2626");
}

#[test]
fn test_no_active_habits() {
    let state = april_2024();
    let snapshot = compute_analytics(&state);

    assert_eq!(snapshot.total_possible, 0);
    assert_eq!(snapshot.total_completed, 0);
    assert_eq!(snapshot.completion_rate, 0.0);
    assert_eq!(snapshot.active_habits_count, 0);
    assert!(snapshot.best_habit.is_none());
    assert!(snapshot.worst_habit.is_none());
    assert!(snapshot.displayable_worst().is_none());
    assert_eq!(snapshot.longest_overall_streak, 0);
}

#[test]
fn test_single_active_habit_suppresses_worst() {
    let mut state = april_2024();
    state.set_habit(4, "Stretch", Category::Health);
    complete_days(&mut state, 4, 1..=15);

    let snapshot = compute_analytics(&state);
    assert_eq!(snapshot.completion_rate, 50.0);
    assert_eq!(snapshot.best_habit, snapshot.worst_habit);
    assert!(!snapshot.worst_is_meaningful);
    assert!(snapshot.displayable_worst().is_none());
}

#[test]
fn test_aggregate_and_ranking() {
    let mut state = april_2024();
    state.set_habit(1, "A", Category::Health);
    state.set_habit(3, "B", Category::Work);
    state.set_habit(7, "C", Category::Personal);
    complete_days(&mut state, 1, 1..=10);
    complete_days(&mut state, 3, 1..=30);
    complete_days(&mut state, 7, 1..=10);

    let snapshot = compute_analytics(&state);

    assert_eq!(snapshot.active_habits_count, 3);
    assert_eq!(snapshot.total_possible, 90);
    assert_eq!(snapshot.total_completed, 50);
    assert_eq!(snapshot.remaining(), 40);
    assert_eq!(snapshot.longest_overall_streak, 30);
    assert_eq!(
        snapshot
            .habit_stats
            .iter()
            .map(|s| s.habit_index)
            .collect::<Vec<_>>(),
        vec![1, 3, 7]
    );

    assert_eq!(snapshot.best_habit.as_ref().map(|h| h.name.as_str()), Some("B"));
    // Ties keep slot order, so the later of the two equal habits ranks last.
    assert_eq!(snapshot.displayable_worst().map(|h| h.name.as_str()), Some("C"));
}

#[test]
fn test_best_tie_prefers_earlier_slot() {
    let mut state = april_2024();
    state.set_habit(2, "First", Category::Health);
    state.set_habit(5, "Second", Category::Health);
    complete_days(&mut state, 2, 1..=5);
    complete_days(&mut state, 5, 1..=5);

    let snapshot = compute_analytics(&state);
    assert_eq!(snapshot.best_habit.map(|h| h.habit_index), Some(2));
}

#[test]
fn test_compute_is_referentially_transparent() {
    let mut state = april_2024();
    state.set_habit(0, "Run", Category::Health);
    complete_days(&mut state, 0, [2, 3, 9]);
    let before = state.clone();

    let first = compute_analytics(&state);
    let second = compute_analytics(&state);

    assert_eq!(first, second);
    assert_eq!(state, before);
}

#[test]
fn test_other_months_do_not_count() {
    let mut state = april_2024();
    state.set_habit(0, "Run", Category::Health);
    state.change_month(1);
    complete_days(&mut state, 0, 1..=5);
    state.change_month(-1);

    assert_eq!(compute_analytics(&state).total_completed, 0);
}
