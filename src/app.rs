use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::watch;

use crate::analytics::{AnalyticsSnapshot, compute_analytics};
use crate::persistence::{MigrationOutcome, Reconciler, SaveOutcome, StateUpdates};
use crate::session::Identity;
use crate::types::{AppState, Category, CompletionLog, HabitSlot, MAX_HABITS};

/// Asks the user to affirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Subset of an exported document that import reads.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportDocument {
    habits: Option<Vec<HabitSlot>>,
    habit_logs: Option<CompletionLog>,
}

/// Sole owner of the live state. Every mutation is followed by a save of
/// the same in-memory value.
pub struct App {
    state: AppState,
    reconciler: Reconciler,
}

impl App {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            state: AppState::default(),
            reconciler,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.reconciler
            .session()
            .and_then(|session| session.current_identity())
    }

    /// Observe sign-in and sign-out, when remote storage is wired in.
    pub fn watch_identity(&self) -> Option<watch::Receiver<Option<Identity>>> {
        self.reconciler.session().map(|session| session.watch())
    }

    /// Load from the authoritative store, then make sure the ten slots exist.
    pub async fn load_state(&mut self) {
        if let Some(state) = self.reconciler.load().await {
            self.state = state;
        }
        if self.state.initialize_if_empty() {
            self.save_state().await;
        }
    }

    pub async fn save_state(&self) -> SaveOutcome {
        self.reconciler.save(&self.state).await
    }

    pub async fn migrate_once(&self, identity: &Identity) -> MigrationOutcome {
        self.reconciler.migrate_once(identity).await
    }

    pub fn analytics(&self) -> AnalyticsSnapshot {
        compute_analytics(&self.state)
    }

    /// Flip a grid cell. Unnamed slots and days outside the month are inert.
    /// Returns the new completion value when the toggle happened.
    pub async fn toggle(&mut self, habit_index: usize, day: u32) -> Option<bool> {
        let active = self
            .state
            .habits
            .get(habit_index)
            .is_some_and(HabitSlot::is_active);
        if !active || day == 0 || day > self.state.days_in_current_month() {
            return None;
        }

        let completed = self.state.toggle_completion(habit_index, day);
        self.save_state().await;
        Some(completed)
    }

    pub async fn set_habit(&mut self, habit_index: usize, name: &str, category: Category) -> bool {
        if !self.state.set_habit(habit_index, name, category) {
            return false;
        }
        self.save_state().await;
        true
    }

    pub async fn delete_habit(&mut self, habit_index: usize, confirm: &dyn Confirm) -> bool {
        let Some(habit) = self.state.habits.get(habit_index).filter(|h| h.is_active()) else {
            return false;
        };

        let prompt = format!(
            "Are you sure you want to delete \"{}\"?\n\nThis will remove the habit and all its tracking data.",
            habit.name
        );
        if !confirm.confirm(&prompt) {
            return false;
        }

        self.state.delete_habit(habit_index);
        self.save_state().await;
        true
    }

    pub async fn change_month(&mut self, delta: i32) {
        self.state.change_month(delta);
        self.save_state().await;
    }

    pub async fn reset_month(&mut self, confirm: &dyn Confirm) -> bool {
        let prompt = format!(
            "Are you sure you want to reset all habit data for {}? This action cannot be undone.",
            self.state.month_header()
        );
        if !confirm.confirm(&prompt) {
            return false;
        }

        self.state.reset_month();
        self.save_state().await;
        true
    }

    /// Replace the live state with a remote push. Not saved back.
    pub fn apply_remote_update(&mut self, state: AppState) {
        self.state = state;
    }

    pub fn subscribe(&self) -> Option<StateUpdates> {
        self.reconciler.subscribe()
    }

    pub fn export_json(&self) -> Result<String> {
        simd_json::to_string_pretty(&self.state).context("Failed to serialize export")
    }

    /// Replace habits and logs from an exported file. The selected month is kept.
    pub async fn import_json(&mut self, text: &str) -> Result<()> {
        let mut bytes = text.as_bytes().to_vec();
        let document: ImportDocument = simd_json::from_slice(&mut bytes)
            .context("Error importing data. Please check the file format.")?;

        if let Some(mut habits) = document.habits {
            habits.resize(MAX_HABITS, HabitSlot::default());
            self.state.habits = habits;
        }
        if let Some(habit_logs) = document.habit_logs {
            self.state.habit_logs = habit_logs;
        }

        self.save_state().await;
        Ok(())
    }
}
