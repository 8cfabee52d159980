//! In-process latest-value store: one snapshot per system id.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use crate::types::Snapshot;

/// Entries are swapped as whole `Arc`s, so a reader sees either the old
/// snapshot or the new one, never a mix.
#[derive(Clone, Default)]
pub struct LatestStore {
    inner: Arc<RwLock<HashMap<String, Arc<Snapshot>>>>,
}

impl LatestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is held for `snapshot.system_id`. Returns the number
    /// of systems held when this id is new, `None` for a replacement.
    pub async fn put(&self, snapshot: Snapshot) -> Option<usize> {
        let key = snapshot.system_id.clone();
        let mut map = self.inner.write().await;
        match map.insert(key, Arc::new(snapshot)) {
            Some(_) => None,
            None => Some(map.len()),
        }
    }

    pub async fn get(&self, system_id: &str) -> Option<Arc<Snapshot>> {
        self.inner.read().await.get(system_id).cloned()
    }

    /// Lazy fill from durable storage. Keeps an entry that a concurrent
    /// `put` added while the caller was reading the database.
    pub async fn warm(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let key = snapshot.system_id.clone();
        self.inner
            .write()
            .await
            .entry(key)
            .or_insert_with(|| Arc::new(snapshot))
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
