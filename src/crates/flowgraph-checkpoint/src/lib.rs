//! # flowgraph-checkpoint
//!
//! Checkpoint types and storage abstractions for the flowgraph execution
//! engine.
//!
//! The executor in `flowgraph-core` emits an [`ExecutionCheckpoint`] after
//! every batch: the ready list, the LIFO deferred stack (bottom-to-top), the
//! pending dependency map, the commit log, and a per-node serialized state
//! map. Any one of those snapshots is enough to resume the run — including
//! re-running a failed batch, whose contents an error checkpoint carries as
//! its ready list.
//!
//! This crate has no dependency on the engine; the dependency points the
//! other way.
//!
//! - [`checkpoint`] — the wire types.
//! - [`store`] — the async [`CheckpointStore`] backend trait.
//! - [`memory`] — the in-memory reference backend.
//! - [`serializer`] — byte-level encoding protocol for stores that persist
//!   checkpoints as blobs.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod serializer;
pub mod store;

pub use checkpoint::{ExecutionCheckpoint, NodeStateMap};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointStore;
pub use serializer::{CheckpointSerializer, JsonSerializer};
pub use store::CheckpointStore;
