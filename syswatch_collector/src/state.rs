//! Shared collector state: the latest-value store, the durable repository
//! behind it, and the public base URL used for dashboard links.

use std::sync::Arc;
use tracing::warn;
use url::Url;

use crate::db::{SnapshotRepository, StoreError};
use crate::store::LatestStore;
use crate::types::Snapshot;

#[derive(Clone)]
pub struct AppState {
    pub store: LatestStore,
    pub repo: Arc<dyn SnapshotRepository>,
    pub public_url: Url,
}

impl AppState {
    pub fn new(repo: Arc<dyn SnapshotRepository>, public_url: Url) -> Self {
        Self {
            store: LatestStore::new(),
            repo,
            public_url,
        }
    }

    /// Write to durable storage on the blocking pool.
    pub async fn persist(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        let repo = self.repo.clone();
        tokio::task::spawn_blocking(move || repo.upsert(&snapshot))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn fetch_durable(&self, system_id: &str) -> Result<Option<Snapshot>, StoreError> {
        let repo = self.repo.clone();
        let id = system_id.to_string();
        tokio::task::spawn_blocking(move || repo.fetch(&id))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Cache first, then durable storage; a database hit warms the cache.
    /// Storage errors are logged and read as "unknown system".
    pub async fn resolve(&self, system_id: &str) -> Option<Arc<Snapshot>> {
        if let Some(hit) = self.store.get(system_id).await {
            return Some(hit);
        }
        match self.fetch_durable(system_id).await {
            Ok(Some(snapshot)) => Some(self.store.warm(snapshot).await),
            Ok(None) => None,
            Err(e) => {
                warn!(%system_id, "durable lookup failed: {e}");
                None
            }
        }
    }

    /// `<public_url>/view/<system_id>/`, with the id encoded as one segment.
    pub fn dashboard_url(&self, system_id: &str) -> String {
        let mut url = self.public_url.clone();
        match url.path_segments_mut() {
            Ok(mut segs) => {
                segs.pop_if_empty().push("view").push(system_id).push("");
            }
            Err(()) => {
                return format!(
                    "{}/view/{system_id}/",
                    self.public_url.as_str().trim_end_matches('/')
                )
            }
        }
        url.to_string()
    }
}
