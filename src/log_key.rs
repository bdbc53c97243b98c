//! Composite keys for the sparse completion log.
//!
//! A key looks like `2024-03-4-17`: the `YYYY-MM` month identifier, then the
//! habit slot, then the day. Components are numeric, so `-` can never appear
//! inside the slot or day and the trailing two fields always split cleanly.

/// `"{year}-{MM}"` for a 0-indexed month.
pub fn month_key(month: u32, year: i32) -> String {
    format!("{}-{:02}", year, u64::from(month) + 1)
}

pub fn log_key(month_key: &str, habit_index: usize, day: u32) -> String {
    format!("{month_key}-{habit_index}-{day}")
}
