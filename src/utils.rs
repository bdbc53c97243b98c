use std::collections::HashSet;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::Local;
use parking_lot::Mutex;

use crate::types::MAX_HABITS;

static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Print a warning to stderr unless the same message was already printed.
pub fn warn_once(message: impl Into<String>) {
    let message = message.into();
    let cache = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));

    if cache.lock().insert(message.clone()) {
        eprintln!("{message}");
    }
}

/// Whole-percent label, rounded half up like the dashboard cards.
pub fn format_rate(rate: f64) -> String {
    format!("{}%", (rate + 0.5).floor() as i64)
}

/// Convert a 1-based habit number from the command line into a slot index.
pub fn parse_habit_number(value: &str) -> Result<usize> {
    let number: usize = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid habit number: {value}"))?;
    if number == 0 || number > MAX_HABITS {
        anyhow::bail!("Habit number must be between 1 and {MAX_HABITS}");
    }
    Ok(number - 1)
}

pub fn export_file_name() -> String {
    format!(
        "habitgrid-export-{}.json",
        Local::now().date_naive().format("%Y-%m-%d")
    )
}
