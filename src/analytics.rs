use serde::Serialize;

use crate::types::{AppState, Category};

/// Display bucket for a completion rate. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    Excellent,
    Good,
    Average,
    Poor,
}

impl PerformanceTier {
    pub fn from_rate(completion_rate: f64) -> Self {
        if completion_rate >= 80.0 {
            PerformanceTier::Excellent
        } else if completion_rate >= 60.0 {
            PerformanceTier::Good
        } else if completion_rate >= 40.0 {
            PerformanceTier::Average
        } else {
            PerformanceTier::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "excellent",
            PerformanceTier::Good => "good",
            PerformanceTier::Average => "average",
            PerformanceTier::Poor => "poor",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            PerformanceTier::Excellent => "#16A34A",
            PerformanceTier::Good => "#0F766E",
            PerformanceTier::Average => "#F59E0B",
            PerformanceTier::Poor => "#DC2626",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitStats {
    pub habit_index: usize,
    pub name: String,
    pub category: Category,
    pub completed: u32,
    pub completion_rate: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub missed: u32,
}

impl HabitStats {
    pub fn tier(&self) -> PerformanceTier {
        PerformanceTier::from_rate(self.completion_rate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub days_in_month: u32,
    pub total_possible: u32,
    pub total_completed: u32,
    pub completion_rate: f64,
    pub active_habits_count: usize,
    pub habit_stats: Vec<HabitStats>,
    pub best_habit: Option<HabitStats>,
    pub worst_habit: Option<HabitStats>,
    /// False when fewer than two habits are active; with a single habit the
    /// worst habit is the best habit and must not be shown as such.
    pub worst_is_meaningful: bool,
    pub longest_overall_streak: u32,
}

impl AnalyticsSnapshot {
    pub fn tier(&self) -> PerformanceTier {
        PerformanceTier::from_rate(self.completion_rate)
    }

    /// Worst habit, only when it can be told apart from the best one.
    pub fn displayable_worst(&self) -> Option<&HabitStats> {
        if self.worst_is_meaningful {
            self.worst_habit.as_ref()
        } else {
            None
        }
    }

    pub fn remaining(&self) -> u32 {
        self.total_possible.saturating_sub(self.total_completed)
    }
}

fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) * 100.0 / f64::from(whole)
    }
}

fn habit_stats(state: &AppState, habit_index: usize, days: u32) -> HabitStats {
    let mut completed = 0;
    let mut longest_streak = 0;
    let mut run = 0;

    for day in 1..=days {
        if state.is_completed(habit_index, day) {
            completed += 1;
            run += 1;
            longest_streak = longest_streak.max(run);
        } else {
            run = 0;
        }
    }

    // Anchored at month end, not at today.
    let current_streak = (1..=days)
        .rev()
        .take_while(|&day| state.is_completed(habit_index, day))
        .count() as u32;

    let slot = &state.habits[habit_index];
    HabitStats {
        habit_index,
        name: slot.name.clone(),
        category: slot.category,
        completed,
        completion_rate: percentage(completed, days),
        current_streak,
        longest_streak,
        missed: days - completed,
    }
}

/// Derives per-habit and aggregate statistics for the selected month.
pub fn compute_analytics(state: &AppState) -> AnalyticsSnapshot {
    let days = state.days_in_current_month();

    let habit_stats: Vec<HabitStats> = state
        .habits
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_active())
        .map(|(index, _)| habit_stats(state, index, days))
        .collect();

    let active_habits_count = habit_stats.len();
    let total_possible = active_habits_count as u32 * days;
    let total_completed: u32 = habit_stats.iter().map(|s| s.completed).sum();

    // Stable sort keeps slot order among equal rates.
    let mut ranked = habit_stats.clone();
    ranked.sort_by(|a, b| b.completion_rate.total_cmp(&a.completion_rate));

    let longest_overall_streak = habit_stats
        .iter()
        .map(|s| s.longest_streak)
        .max()
        .unwrap_or(0);

    AnalyticsSnapshot {
        days_in_month: days,
        total_possible,
        total_completed,
        completion_rate: percentage(total_completed, total_possible),
        active_habits_count,
        best_habit: ranked.first().cloned(),
        worst_habit: ranked.last().cloned(),
        worst_is_meaningful: active_habits_count > 1,
        habit_stats,
        longest_overall_streak,
    }
}

#[cfg(test)]
mod tests;
