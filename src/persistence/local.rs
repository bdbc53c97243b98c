use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use super::LocalBackend;
use crate::utils::warn_once;

const STORE_FILE: &str = "local-storage.json";

/// Local key/value store kept as one JSON object on disk.
pub struct FileLocalStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileLocalStore {
    /// Open (or create) the store in `dir`. An unreadable store file is
    /// treated as empty so startup never fails on bad local data.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        let path = dir.join(STORE_FILE);

        let entries = if path.exists() {
            let mut bytes = fs::read(&path).context("Failed to read local store")?;
            match simd_json::from_slice::<BTreeMap<String, String>>(&mut bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn_once(format!(
                        "⚠️  Ignoring unreadable local store {}: {e}",
                        path.display()
                    ));
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalBackend for FileLocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        let content =
            simd_json::to_string_pretty(&*entries).context("Failed to serialize local store")?;
        fs::write(&self.path, content).context("Failed to write local store")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let store = FileLocalStore::open(dir.path()).expect("open");
        assert!(store.get("habitgrid_data").is_none());

        store.set("habitgrid_data", r#"{"habits":[]}"#).expect("set");
        store.set("habitgrid_migrated_u1", "true").expect("set marker");

        let reopened = FileLocalStore::open(dir.path()).expect("reopen");
        assert_eq!(
            reopened.get("habitgrid_data").as_deref(),
            Some(r#"{"habits":[]}"#)
        );
        assert_eq!(reopened.get("habitgrid_migrated_u1").as_deref(), Some("true"));
    }

    #[test]
    fn corrupt_store_opens_empty() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join(STORE_FILE), "{not json").expect("write");

        let store = FileLocalStore::open(dir.path()).expect("open");
        assert!(store.get("habitgrid_data").is_none());

        store.set("k", "v").expect("set overwrites corrupt file");
        let reopened = FileLocalStore::open(dir.path()).expect("reopen");
        assert_eq!(reopened.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn creates_missing_directory() {
        let dir = TempDir::new().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        let store = FileLocalStore::open(&nested).expect("open");
        assert!(store.path().starts_with(&nested));
    }
}
