//! In-memory checkpoint store
//!
//! Reference [`CheckpointStore`] backend holding per-run histories in an
//! `Arc<RwLock<HashMap>>`. Suited to tests and single-process runs; nothing
//! survives the process.

use crate::checkpoint::ExecutionCheckpoint;
use crate::error::Result;
use crate::store::CheckpointStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Storage = Arc<RwLock<HashMap<String, Vec<ExecutionCheckpoint>>>>;

/// Thread-safe in-memory checkpoint store.
///
/// Cloning is cheap and shares the underlying storage, so the same store can
/// be handed to an executor and inspected from a test.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    storage: Storage,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of runs with at least one checkpoint.
    pub async fn run_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of stored checkpoints across all runs.
    pub async fn checkpoint_count(&self) -> usize {
        self.storage.read().await.values().map(Vec::len).sum()
    }

    /// Drop everything.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(&self, checkpoint: ExecutionCheckpoint) -> Result<()> {
        let mut storage = self.storage.write().await;
        let history = storage.entry(checkpoint.run_id.clone()).or_default();
        match history.iter_mut().find(|cp| cp.step == checkpoint.step) {
            Some(existing) => *existing = checkpoint,
            None => {
                history.push(checkpoint);
                history.sort_by_key(|cp| cp.step);
            }
        }
        Ok(())
    }

    async fn get(&self, run_id: &str, step: u64) -> Result<Option<ExecutionCheckpoint>> {
        let storage = self.storage.read().await;
        Ok(storage
            .get(run_id)
            .and_then(|history| history.iter().find(|cp| cp.step == step).cloned()))
    }

    async fn latest(&self, run_id: &str) -> Result<Option<ExecutionCheckpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.get(run_id).and_then(|history| history.last().cloned()))
    }

    async fn list(&self, run_id: &str) -> Result<Vec<ExecutionCheckpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.get(run_id).cloned().unwrap_or_default())
    }

    async fn delete_run(&self, run_id: &str) -> Result<()> {
        self.storage.write().await.remove(run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(run: &str, step: u64) -> ExecutionCheckpoint {
        ExecutionCheckpoint::new(run, "entry").with_step(step)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryCheckpointStore::new();
        store.put(checkpoint("run-1", 0)).await.unwrap();
        store.put(checkpoint("run-1", 1)).await.unwrap();

        let cp = store.get("run-1", 1).await.unwrap().unwrap();
        assert_eq!(cp.step, 1);
        assert!(store.get("run-1", 7).await.unwrap().is_none());
        assert!(store.get("run-2", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_follows_step_order() {
        let store = InMemoryCheckpointStore::new();
        // Out-of-order insertion; latest is still the highest step.
        store.put(checkpoint("run-1", 2)).await.unwrap();
        store.put(checkpoint("run-1", 0)).await.unwrap();
        store.put(checkpoint("run-1", 1)).await.unwrap();

        let latest = store.latest("run-1").await.unwrap().unwrap();
        assert_eq!(latest.step, 2);

        let history = store.list("run-1").await.unwrap();
        let steps: Vec<u64> = history.iter().map(|cp| cp.step).collect();
        assert_eq!(steps, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_put_replaces_same_step() {
        let store = InMemoryCheckpointStore::new();
        store.put(checkpoint("run-1", 0)).await.unwrap();
        store
            .put(checkpoint("run-1", 0).with_failure("n", "boom"))
            .await
            .unwrap();

        assert_eq!(store.checkpoint_count().await, 1);
        let cp = store.get("run-1", 0).await.unwrap().unwrap();
        assert!(cp.is_error());
    }

    #[tokio::test]
    async fn test_latest_error() {
        let store = InMemoryCheckpointStore::new();
        store.put(checkpoint("run-1", 0)).await.unwrap();
        store
            .put(checkpoint("run-1", 1).with_failure("counter", "boom"))
            .await
            .unwrap();
        store.put(checkpoint("run-1", 2)).await.unwrap();

        let err = store.latest_error("run-1").await.unwrap().unwrap();
        assert_eq!(err.step, 1);
        assert_eq!(err.failed_node_id.as_deref(), Some("counter"));
    }

    #[tokio::test]
    async fn test_delete_run_and_clear() {
        let store = InMemoryCheckpointStore::new();
        store.put(checkpoint("run-1", 0)).await.unwrap();
        store.put(checkpoint("run-2", 0)).await.unwrap();
        assert_eq!(store.run_count().await, 2);

        store.delete_run("run-1").await.unwrap();
        assert_eq!(store.run_count().await, 1);
        assert!(store.latest("run-1").await.unwrap().is_none());

        store.clear().await;
        assert_eq!(store.checkpoint_count().await, 0);
    }
}
