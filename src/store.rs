use chrono::{Datelike, NaiveDate};

use crate::log_key::{log_key, month_key};
use crate::types::{AppState, Category, HabitSlot, MAX_HABITS};

/// Number of days in a 0-indexed month, leap years included.
///
/// Takes the first of the following month and steps back one day. Returns 0
/// for years chrono cannot represent.
pub fn days_in_month(month: u32, year: i32) -> u32 {
    let next = i64::from(year) * 12 + i64::from(month) + 1;
    let (Ok(next_year), Ok(next_month)) = (
        i32::try_from(next.div_euclid(12)),
        u32::try_from(next.rem_euclid(12) + 1),
    ) else {
        return 0;
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(0)
}

impl AppState {
    /// Populates the ten empty slots the first time a store is used.
    ///
    /// Returns true when slots were created. A store whose slots were all
    /// deleted keeps its ten entries and is left alone.
    pub fn initialize_if_empty(&mut self) -> bool {
        if !self.habits.is_empty() {
            return false;
        }
        self.habits = vec![HabitSlot::default(); MAX_HABITS];
        true
    }

    pub fn current_month_key(&self) -> String {
        month_key(self.current_month, self.current_year)
    }

    /// Log key for a slot/day in the currently selected month.
    pub fn log_key_for(&self, habit_index: usize, day: u32) -> String {
        log_key(&self.current_month_key(), habit_index, day)
    }

    pub fn days_in_current_month(&self) -> u32 {
        days_in_month(self.current_month, self.current_year)
    }

    pub fn is_completed(&self, habit_index: usize, day: u32) -> bool {
        self.habit_logs
            .get(&self.log_key_for(habit_index, day))
            .copied()
            .unwrap_or(false)
    }

    /// Flips the completion flag for a slot/day and returns the new value.
    pub fn toggle_completion(&mut self, habit_index: usize, day: u32) -> bool {
        let key = self.log_key_for(habit_index, day);
        let entry = self.habit_logs.entry(key).or_insert(false);
        *entry = !*entry;
        *entry
    }

    /// Names a slot. Blank names and out-of-range slots are rejected.
    pub fn set_habit(&mut self, habit_index: usize, name: &str, category: Category) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let Some(slot) = self.habits.get_mut(habit_index) else {
            return false;
        };
        *slot = HabitSlot {
            name: name.to_string(),
            category,
        };
        true
    }

    /// Resets a slot to the unassigned default and purges its entries for the
    /// selected month. Entries in other months are kept.
    pub fn delete_habit(&mut self, habit_index: usize) -> bool {
        let Some(slot) = self.habits.get_mut(habit_index) else {
            return false;
        };
        *slot = HabitSlot::default();
        self.purge_month_entries(habit_index);
        true
    }

    /// Moves the selected month by `delta`, carrying into the year.
    pub fn change_month(&mut self, delta: i32) {
        let total =
            i64::from(self.current_year) * 12 + i64::from(self.current_month) + i64::from(delta);
        // Month is always in 0..12 after rem_euclid; year saturates at i32 bounds.
        self.current_month = total.rem_euclid(12) as u32;
        self.current_year = total
            .div_euclid(12)
            .clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    }

    /// Clears every slot's entries for the selected month. Habits are untouched.
    pub fn reset_month(&mut self) {
        for habit_index in 0..self.habits.len() {
            self.purge_month_entries(habit_index);
        }
    }

    fn purge_month_entries(&mut self, habit_index: usize) {
        for day in 1..=self.days_in_current_month() {
            let key = self.log_key_for(habit_index, day);
            self.habit_logs.remove(&key);
        }
    }
}
