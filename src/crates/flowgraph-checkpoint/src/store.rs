//! Extensible checkpoint storage trait for custom backend implementations
//!
//! [`CheckpointStore`] is the abstraction the executor writes through after
//! every batch. A backend only has to persist and retrieve
//! [`ExecutionCheckpoint`] values keyed by `(run_id, step)`; everything the
//! engine needs for resume is inside the checkpoint itself.
//!
//! The in-memory implementation in [`crate::memory`] is the reference
//! backend; database- or file-backed stores implement the same trait.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use flowgraph_checkpoint::{
//!     CheckpointSerializer, CheckpointStore, ExecutionCheckpoint, JsonSerializer, Result,
//! };
//!
//! struct FileStore { dir: std::path::PathBuf }
//!
//! #[async_trait]
//! impl CheckpointStore for FileStore {
//!     async fn put(&self, checkpoint: ExecutionCheckpoint) -> Result<()> {
//!         let path = self.dir.join(format!("{}-{}.json", checkpoint.run_id, checkpoint.step));
//!         tokio::fs::write(path, JsonSerializer::new().dumps(&checkpoint)?).await?;
//!         Ok(())
//!     }
//!     // ... get / latest / list / delete_run ...
//! }
//! ```

use crate::checkpoint::ExecutionCheckpoint;
use crate::error::Result;
use async_trait::async_trait;

/// Storage backend for run checkpoints.
///
/// Checkpoints of one run form an ordered history by `step`; `latest` is the
/// natural resume point, `get` supports time-travel to any earlier batch.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint. Writing the same `(run_id, step)` twice
    /// replaces the earlier snapshot.
    async fn put(&self, checkpoint: ExecutionCheckpoint) -> Result<()>;

    /// Fetch the checkpoint of a specific batch, if present.
    async fn get(&self, run_id: &str, step: u64) -> Result<Option<ExecutionCheckpoint>>;

    /// Fetch the most recent checkpoint of a run, if any.
    async fn latest(&self, run_id: &str) -> Result<Option<ExecutionCheckpoint>>;

    /// Full history of a run, ordered by step.
    async fn list(&self, run_id: &str) -> Result<Vec<ExecutionCheckpoint>>;

    /// Drop every checkpoint of a run.
    async fn delete_run(&self, run_id: &str) -> Result<()>;

    /// The last error checkpoint of a run, if its history contains one.
    ///
    /// Convenience for the resume-after-failure flow; backends may override
    /// with an indexed lookup.
    async fn latest_error(&self, run_id: &str) -> Result<Option<ExecutionCheckpoint>> {
        let history = self.list(run_id).await?;
        Ok(history.into_iter().rev().find(|cp| cp.is_error()))
    }
}
