//! In-memory backends for exercising the reconciler without IO.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Document, LocalBackend, RemoteBackend, Subscription, UPDATED_AT_FIELD};
use crate::session::Identity;

#[derive(Default)]
pub struct MemoryLocalStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl LocalBackend for MemoryLocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Document store with top-level merge writes, a write counter, failure
/// injection and manual pushes to subscribers.
#[derive(Default)]
pub struct MemoryRemote {
    documents: Mutex<HashMap<Identity, Document>>,
    subscribers: Mutex<Vec<(Identity, mpsc::Sender<Document>)>>,
    writes: AtomicUsize,
    clock: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn document(&self, identity: &Identity) -> Option<Document> {
        self.documents.lock().get(identity).cloned()
    }

    pub fn insert(&self, identity: &Identity, document: Document) {
        self.documents.lock().insert(identity.clone(), document);
    }

    pub fn clear(&self, identity: &Identity) {
        self.documents.lock().remove(identity);
    }

    /// Deliver `document` to every live subscriber of `identity`.
    pub fn push(&self, identity: &Identity, document: Document) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(id, tx)| !tx.is_closed() || id != identity);
        for (id, tx) in subscribers.iter() {
            if id == identity {
                let _ = tx.try_send(document.clone());
            }
        }
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("Service unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for MemoryRemote {
    async fn get_document(&self, identity: &Identity) -> Result<Option<Document>> {
        self.check()?;
        Ok(self.document(identity))
    }

    async fn set_document(&self, identity: &Identity, fields: Document) -> Result<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let stamp = self.clock.fetch_add(1, Ordering::SeqCst);

        let mut documents = self.documents.lock();
        let document = documents.entry(identity.clone()).or_default();
        document.extend(fields);
        document.insert(UPDATED_AT_FIELD.to_string(), serde_json::json!(stamp));
        Ok(())
    }

    fn subscribe(&self, identity: &Identity) -> Result<Subscription> {
        self.check()?;
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().push((identity.clone(), tx));
        Ok(Subscription::new(rx, None))
    }
}
