use std::fmt::Write;

use crate::analytics::AnalyticsSnapshot;
use crate::types::AppState;
use crate::utils::format_rate;

const NAME_WIDTH: usize = 24;

/// Wrap `text` in a 24-bit ANSI foreground color given as `#RRGGBB`.
fn paint(text: &str, hex: &str, colored: bool) -> String {
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    match (colored, channel(1..3), channel(3..5), channel(5..7)) {
        (true, Some(r), Some(g), Some(b)) => format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m"),
        _ => text.to_string(),
    }
}

fn fit(name: &str, width: usize) -> String {
    let mut fitted: String = name.chars().take(width).collect();
    let len = fitted.chars().count();
    fitted.extend(std::iter::repeat_n(' ', width - len));
    fitted
}

/// Monthly grid: one row per slot, one column per day 1..=31.
pub fn render_grid(state: &AppState, colored: bool) -> String {
    let days = state.days_in_current_month();
    let mut out = String::new();

    let _ = writeln!(out, "{}", state.month_header());
    let _ = write!(out, "    {}", fit("Habits", NAME_WIDTH));
    for day in 1..=31u32 {
        if day <= days {
            let _ = write!(out, "{day:>3}");
        } else {
            out.push_str("   ");
        }
    }
    out.push('\n');

    for (index, habit) in state.habits.iter().enumerate() {
        if habit.is_active() {
            let tag = format!("[{}]", habit.category.display_name());
            let name = fit(&habit.name, NAME_WIDTH.saturating_sub(tag.chars().count() + 1));
            let tag = paint(&tag, habit.category.color(), colored);
            let _ = write!(out, "{:>2}. {tag} {name}", index + 1);
        } else {
            let _ = write!(out, "{:>2}. {}", index + 1, fit("(empty)", NAME_WIDTH));
        }

        for day in 1..=31u32 {
            let cell = if !habit.is_active() || day > days {
                ' '
            } else if state.is_completed(index, day) {
                '■'
            } else {
                '·'
            };
            let _ = write!(out, "  {cell}");
        }
        out.push('\n');
    }

    out
}

pub fn render_analytics(snapshot: &AnalyticsSnapshot, colored: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Completed: {}   Active habits: {}   Longest streak: {}   Completion: {}",
        snapshot.total_completed,
        snapshot.active_habits_count,
        snapshot.longest_overall_streak,
        paint(
            &format_rate(snapshot.completion_rate),
            snapshot.tier().color(),
            colored
        )
    );
    let _ = writeln!(
        out,
        "{} out of {} habit actions completed",
        snapshot.total_completed, snapshot.total_possible
    );
    out.push('\n');

    if snapshot.habit_stats.is_empty() {
        out.push_str("No active habits to display\n");
    } else {
        for stat in &snapshot.habit_stats {
            let _ = writeln!(
                out,
                "  {} {:>5}   Streak: {:<3} Missed: {:<3} {}",
                fit(&stat.name, NAME_WIDTH),
                format_rate(stat.completion_rate),
                stat.longest_streak,
                stat.missed,
                paint(stat.tier().label(), stat.tier().color(), colored)
            );
        }
    }
    out.push('\n');

    match &snapshot.best_habit {
        Some(best) => {
            let _ = writeln!(
                out,
                "Best:  {} ({} completion, {} day streak)",
                best.name,
                format_rate(best.completion_rate),
                best.longest_streak
            );
        }
        None => out.push_str("Best:  - (No habits tracked yet)\n"),
    }

    match snapshot.displayable_worst() {
        Some(worst) => {
            let _ = writeln!(
                out,
                "Worst: {} ({} completion, {} days missed)",
                worst.name,
                format_rate(worst.completion_rate),
                worst.missed
            );
        }
        None => out.push_str("Worst: - (Track more habits to see)\n"),
    }

    out
}
