use std::collections::BTreeMap;

use chrono::{Datelike, Local};
use serde::{Deserialize, Deserializer, Serialize};

/// Number of fixed habit slots in every store.
pub const MAX_HABITS: usize = 10;

pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Display name for a 0-indexed month. Out-of-range values wrap.
pub fn month_name(month: u32) -> &'static str {
    MONTHS[(month % 12) as usize]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Health,
    Study,
    Work,
    Personal,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Health,
        Category::Study,
        Category::Work,
        Category::Personal,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Health => "Health",
            Category::Study => "Study",
            Category::Work => "Work",
            Category::Personal => "Personal",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::Health => "#16A34A",
            Category::Study => "#1E3A8A",
            Category::Work => "#0F766E",
            Category::Personal => "#F59E0B",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Health => "health",
            Category::Study => "study",
            Category::Work => "work",
            Category::Personal => "personal",
        }
    }

    /// Strict parse used for user input.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

// Persisted documents may carry categories from other clients; anything
// unrecognized reads back as the default rather than failing the load.
impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(Category::parse).unwrap_or_default())
    }
}

/// One positional habit entry. An empty name marks an unassigned slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitSlot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Category,
}

impl HabitSlot {
    pub fn is_active(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Sparse completion log keyed by composite log keys.
pub type CompletionLog = BTreeMap<String, bool>;

/// The unit of persistence: habits, their completion log and the selected month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    pub habits: Vec<HabitSlot>,
    #[serde(default)]
    pub habit_logs: CompletionLog,
    /// 0-indexed month (0 = January).
    #[serde(default = "current_month0")]
    pub current_month: u32,
    #[serde(default = "current_year")]
    pub current_year: i32,
}

fn current_month0() -> u32 {
    Local::now().month0()
}

fn current_year() -> i32 {
    Local::now().year()
}

impl AppState {
    /// Empty state positioned on the given month; habits are not yet initialized.
    pub fn new(current_month: u32, current_year: i32) -> Self {
        Self {
            habits: Vec::new(),
            habit_logs: CompletionLog::new(),
            current_month,
            current_year,
        }
    }

    pub fn month_header(&self) -> String {
        format!("{} {}", month_name(self.current_month), self.current_year)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(current_month0(), current_year())
    }
}
