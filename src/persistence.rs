//! Arbitration between the local store and the remote document store.
//!
//! Local is a write-through cache that is always written. Remote is consulted
//! only while a session exists, wins on load when it has a document, and is
//! allowed to fail: every remote error is logged and absorbed here.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::debug_log;
use crate::session::{Identity, SessionGate};
use crate::types::AppState;
use crate::utils::warn_once;

pub mod local;
#[cfg(test)]
pub mod memory;
pub mod remote;

/// Key of the serialized state in the local store.
pub const STORAGE_KEY: &str = "habitgrid_data";

/// Field the remote store stamps on every write.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// A remote document: a JSON object of top-level fields.
pub type Document = serde_json::Map<String, serde_json::Value>;

pub fn migration_marker_key(identity: &Identity) -> String {
    format!("habitgrid_migrated_{identity}")
}

/// Single-slot synchronous key/value storage that outlives the process.
pub trait LocalBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Hosted document store, one document per identity.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn get_document(&self, identity: &Identity) -> Result<Option<Document>>;

    /// Merge `fields` into the identity's document, creating it if needed.
    /// Fields not named in `fields` are left as they are.
    async fn set_document(&self, identity: &Identity, fields: Document) -> Result<()>;

    /// Push every new version of the identity's document.
    fn subscribe(&self, identity: &Identity) -> Result<Subscription>;
}

/// Stream of pushed documents. Dropping it stops the feed.
pub struct Subscription {
    updates: mpsc::Receiver<Document>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(updates: mpsc::Receiver<Document>, task: Option<JoinHandle<()>>) -> Self {
        Self { updates, task }
    }

    pub async fn next(&mut self) -> Option<Document> {
        self.updates.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Pushed remote states, decoded. Undecodable pushes are skipped.
pub struct StateUpdates {
    subscription: Subscription,
}

impl StateUpdates {
    pub async fn next(&mut self) -> Option<AppState> {
        loop {
            let document = self.subscription.next().await?;
            match decode_document(document) {
                Ok(state) => {
                    debug_log::log("RECONCILER", "PUSH", "remote state received");
                    return Some(state);
                }
                Err(e) => warn_once(format!("⚠️  Ignoring malformed remote update: {e:#}")),
            }
        }
    }

    pub fn unsubscribe(self) {
        self.subscription.unsubscribe();
    }
}

/// Which backends are wired in. Chosen once at startup.
pub enum StorageMode {
    LocalOnly,
    Remote {
        remote: Arc<dyn RemoteBackend>,
        session: Arc<dyn SessionGate>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No session, only the local store was written.
    LocalOnly,
    /// Written locally and merged into the remote document.
    Synced,
    /// Written locally; the remote write failed and was logged.
    RemoteFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No remote backend is configured.
    Unavailable,
    NothingToMigrate,
    AlreadyMigrated,
    /// The identity already had a remote document; it was kept and the
    /// marker set without copying local data over it.
    RemoteKept,
    Migrated,
    /// Remote write failed; the marker stays unset so a later run retries.
    Failed,
}

pub fn encode_state(state: &AppState) -> Result<String> {
    simd_json::to_string(state).context("Failed to serialize state")
}

pub fn decode_state(text: &str) -> Result<AppState> {
    let mut bytes = text.as_bytes().to_vec();
    simd_json::from_slice(&mut bytes).context("Failed to parse stored state")
}

pub fn to_document(state: &AppState) -> Result<Document> {
    match serde_json::to_value(state).context("Failed to serialize state")? {
        serde_json::Value::Object(fields) => Ok(fields),
        other => anyhow::bail!("State serialized to a non-object: {other}"),
    }
}

pub fn decode_document(document: Document) -> Result<AppState> {
    serde_json::from_value(serde_json::Value::Object(document))
        .context("Failed to parse remote document")
}

pub struct Reconciler {
    local: Arc<dyn LocalBackend>,
    mode: StorageMode,
}

impl Reconciler {
    pub fn new(local: Arc<dyn LocalBackend>, mode: StorageMode) -> Self {
        Self { local, mode }
    }

    pub fn session(&self) -> Option<&Arc<dyn SessionGate>> {
        match &self.mode {
            StorageMode::LocalOnly => None,
            StorageMode::Remote { session, .. } => Some(session),
        }
    }

    /// Remote backend and identity, when a session currently exists.
    fn active_remote(&self) -> Option<(&Arc<dyn RemoteBackend>, Identity)> {
        match &self.mode {
            StorageMode::LocalOnly => None,
            StorageMode::Remote { remote, session } => {
                session.current_identity().map(|identity| (remote, identity))
            }
        }
    }

    /// Load the authoritative state: the remote document when a session has
    /// one, otherwise the local store. `None` means no usable data anywhere.
    pub async fn load(&self) -> Option<AppState> {
        if let Some((remote, identity)) = self.active_remote() {
            match remote.get_document(&identity).await {
                Ok(Some(document)) => match decode_document(document) {
                    Ok(state) => {
                        debug_log::log("RECONCILER", "LOAD", "served from remote");
                        return Some(state);
                    }
                    Err(e) => warn_once(format!("⚠️  Remote data unreadable: {e:#}")),
                },
                Ok(None) => debug_log::log("RECONCILER", "LOAD", "no remote document"),
                Err(e) => warn_once(format!(
                    "⚠️  Could not load remote data, using local copy: {e:#}"
                )),
            }
        }

        self.load_local()
    }

    fn load_local(&self) -> Option<AppState> {
        let text = self.local.get(STORAGE_KEY)?;
        match decode_state(&text) {
            Ok(state) => {
                debug_log::log("RECONCILER", "LOAD", "served from local");
                Some(state)
            }
            Err(e) => {
                warn_once(format!("⚠️  Local data unreadable, starting fresh: {e:#}"));
                None
            }
        }
    }

    /// Write `state` locally, then merge it into the remote document when a
    /// session exists. Never fails; a remote failure degrades to local-only.
    pub async fn save(&self, state: &AppState) -> SaveOutcome {
        match encode_state(state).and_then(|text| self.local.set(STORAGE_KEY, &text)) {
            Ok(()) => debug_log::log("RECONCILER", "SAVE", "local written"),
            Err(e) => warn_once(format!("⚠️  Could not write local data: {e:#}")),
        }

        let Some((remote, identity)) = self.active_remote() else {
            return SaveOutcome::LocalOnly;
        };

        let result = match to_document(state) {
            Ok(fields) => remote.set_document(&identity, fields).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                debug_log::log("RECONCILER", "SAVE", "remote merged");
                SaveOutcome::Synced
            }
            Err(e) => {
                warn_once(format!(
                    "⚠️  Could not save to remote, kept local copy: {e:#}"
                ));
                SaveOutcome::RemoteFailed
            }
        }
    }

    /// Copy pre-existing local data into the identity's remote document,
    /// once. The per-identity marker in the local store is the guard. An
    /// existing remote document is never overwritten by local data.
    pub async fn migrate_once(&self, identity: &Identity) -> MigrationOutcome {
        let StorageMode::Remote { remote, .. } = &self.mode else {
            return MigrationOutcome::Unavailable;
        };

        let Some(text) = self.local.get(STORAGE_KEY) else {
            debug_log::log("RECONCILER", "MIGRATE", "no local data");
            return MigrationOutcome::NothingToMigrate;
        };

        let marker = migration_marker_key(identity);
        if self.local.get(&marker).is_some() {
            debug_log::log("RECONCILER", "MIGRATE", "already migrated");
            return MigrationOutcome::AlreadyMigrated;
        }

        match remote.get_document(identity).await {
            Ok(Some(_)) => {
                self.mark_migrated(&marker);
                debug_log::log("RECONCILER", "MIGRATE", "remote document kept");
                return MigrationOutcome::RemoteKept;
            }
            Ok(None) => {}
            Err(e) => {
                warn_once(format!("⚠️  Migration to remote failed: {e:#}"));
                return MigrationOutcome::Failed;
            }
        }

        let fields = match decode_state(&text).and_then(|state| to_document(&state)) {
            Ok(fields) => fields,
            Err(e) => {
                warn_once(format!("⚠️  Local data unreadable, not migrating: {e:#}"));
                return MigrationOutcome::Failed;
            }
        };

        if let Err(e) = remote.set_document(identity, fields).await {
            warn_once(format!("⚠️  Migration to remote failed: {e:#}"));
            return MigrationOutcome::Failed;
        }

        self.mark_migrated(&marker);
        debug_log::log("RECONCILER", "MIGRATE", identity.as_str());
        MigrationOutcome::Migrated
    }

    fn mark_migrated(&self, marker: &str) {
        if let Err(e) = self.local.set(marker, "true") {
            warn_once(format!("⚠️  Could not record migration: {e:#}"));
        }
    }

    /// Feed of remote pushes for the current identity, if any.
    pub fn subscribe(&self) -> Option<StateUpdates> {
        let (remote, identity) = self.active_remote()?;
        match remote.subscribe(&identity) {
            Ok(subscription) => Some(StateUpdates { subscription }),
            Err(e) => {
                warn_once(format!("⚠️  Could not listen for remote changes: {e:#}"));
                None
            }
        }
    }
}
