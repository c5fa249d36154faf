//! Core checkpoint data structures for resumable graph runs
//!
//! An [`ExecutionCheckpoint`] is a complete, JSON-serializable snapshot of a
//! run's scheduler state: the ready list, the deferred stack, the pending
//! dependency map, the commit log, and a per-node state map produced by each
//! node's own state serialization. The executor emits one checkpoint after
//! every batch (and one terminal snapshot); restoring from any of them and
//! continuing reproduces the remainder of the run.
//!
//! Two conventions matter for restore fidelity:
//!
//! - The deferred stack is stored **bottom-to-top**: the last element is the
//!   top of the stack, so push/pop semantics survive a round-trip.
//! - On a failed batch, `ready` holds exactly the contents of that batch, so
//!   a resume re-runs the batch that failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Serialized state of a single node, keyed `in:<port>` / `out:<port>` /
/// `private:<field>`.
pub type NodeStateMap = BTreeMap<String, serde_json::Value>;

/// Snapshot of a run's scheduler state at the end of one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionCheckpoint {
    /// Run this checkpoint belongs to. Side-channel identity used for store
    /// keying and trace correlation.
    pub run_id: String,

    /// Entry node the run was started from.
    pub root_node_id: String,

    /// Subgraph scope of the entry node, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgraph_id: Option<String>,

    /// Nodes whose dependencies are satisfied, in schedule order.
    pub ready: Vec<String>,

    /// Deferred loop re-entries, bottom-to-top (last element is the top of
    /// the stack).
    pub deferred: Vec<String>,

    /// Node id -> ids it still waits on.
    pub pending: BTreeMap<String, Vec<String>>,

    /// Commit log of executed nodes, in commit order. A node re-activated by
    /// a control signal appears once per commit.
    pub completed: Vec<String>,

    /// Per-node serialized state for every node that has entered the run.
    pub node_states: BTreeMap<String, NodeStateMap>,

    /// Node whose `compute` failed, when this is an error checkpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_node_id: Option<String>,

    /// Rendered error of the failed node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_error: Option<String>,

    /// Monotonically increasing batch counter within the run.
    pub step: u64,

    /// Wall-clock time the checkpoint was built.
    pub ts: DateTime<Utc>,
}

impl ExecutionCheckpoint {
    /// Create an empty checkpoint for a run rooted at `root_node_id`.
    pub fn new(run_id: impl Into<String>, root_node_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            root_node_id: root_node_id.into(),
            subgraph_id: None,
            ready: Vec::new(),
            deferred: Vec::new(),
            pending: BTreeMap::new(),
            completed: Vec::new(),
            node_states: BTreeMap::new(),
            failed_node_id: None,
            failed_error: None,
            step: 0,
            ts: Utc::now(),
        }
    }

    /// Create an empty checkpoint with a fresh run id.
    pub fn empty(root_node_id: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), root_node_id)
    }

    /// Set the subgraph scope.
    pub fn with_subgraph(mut self, subgraph_id: impl Into<String>) -> Self {
        self.subgraph_id = Some(subgraph_id.into());
        self
    }

    /// Set the ready list.
    pub fn with_ready(mut self, ready: Vec<String>) -> Self {
        self.ready = ready;
        self
    }

    /// Set the deferred stack (bottom-to-top).
    pub fn with_deferred(mut self, deferred: Vec<String>) -> Self {
        self.deferred = deferred;
        self
    }

    /// Set the pending dependency map.
    pub fn with_pending(mut self, pending: BTreeMap<String, Vec<String>>) -> Self {
        self.pending = pending;
        self
    }

    /// Set the commit log.
    pub fn with_completed(mut self, completed: Vec<String>) -> Self {
        self.completed = completed;
        self
    }

    /// Set the per-node state map.
    pub fn with_node_states(mut self, node_states: BTreeMap<String, NodeStateMap>) -> Self {
        self.node_states = node_states;
        self
    }

    /// Mark this checkpoint as an error checkpoint.
    pub fn with_failure(mut self, node_id: impl Into<String>, error: impl Into<String>) -> Self {
        self.failed_node_id = Some(node_id.into());
        self.failed_error = Some(error.into());
        self
    }

    /// Set the batch counter.
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    /// Whether this checkpoint records a failed batch.
    pub fn is_error(&self) -> bool {
        self.failed_node_id.is_some()
    }

    /// Top of the deferred stack, if any.
    pub fn top_of_deferred(&self) -> Option<&str> {
        self.deferred.last().map(String::as_str)
    }

    /// Whether the run this checkpoint describes has drained both stacks.
    pub fn is_terminal(&self) -> bool {
        self.ready.is_empty() && self.deferred.is_empty() && !self.is_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_creation() {
        let cp = ExecutionCheckpoint::empty("loop");
        assert_eq!(cp.root_node_id, "loop");
        assert!(cp.ready.is_empty());
        assert!(cp.deferred.is_empty());
        assert!(cp.pending.is_empty());
        assert!(!cp.is_error());
        assert!(cp.is_terminal());
        assert!(!cp.run_id.is_empty());
    }

    #[test]
    fn test_checkpoint_builder() {
        let mut pending = BTreeMap::new();
        pending.insert("b".to_string(), vec!["a".to_string()]);

        let cp = ExecutionCheckpoint::new("run-1", "b")
            .with_subgraph("root")
            .with_ready(vec!["a".to_string()])
            .with_deferred(vec!["outer".to_string(), "inner".to_string()])
            .with_pending(pending)
            .with_step(3);

        assert_eq!(cp.subgraph_id.as_deref(), Some("root"));
        assert_eq!(cp.top_of_deferred(), Some("inner"));
        assert_eq!(cp.step, 3);
        assert!(!cp.is_terminal());
    }

    #[test]
    fn test_error_checkpoint() {
        let cp = ExecutionCheckpoint::new("run-1", "loop")
            .with_ready(vec!["counter".to_string()])
            .with_failure("counter", "boom");

        assert!(cp.is_error());
        assert_eq!(cp.failed_node_id.as_deref(), Some("counter"));
        assert_eq!(cp.failed_error.as_deref(), Some("boom"));
        assert!(!cp.is_terminal());
    }

    #[test]
    fn test_deferred_stack_round_trip() {
        // Bottom-to-top ordering must survive serialization.
        let cp = ExecutionCheckpoint::new("run-1", "outer")
            .with_deferred(vec!["outer".to_string(), "inner".to_string()]);

        let text = serde_json::to_string(&cp).unwrap();
        let restored: ExecutionCheckpoint = serde_json::from_str(&text).unwrap();

        assert_eq!(restored.deferred, vec!["outer", "inner"]);
        assert_eq!(restored.top_of_deferred(), Some("inner"));
    }

    #[test]
    fn test_node_states_round_trip() {
        let mut states = BTreeMap::new();
        let mut loop_state = NodeStateMap::new();
        loop_state.insert("private:loop_active".to_string(), json!(true));
        loop_state.insert("private:index".to_string(), json!(4));
        loop_state.insert("out:index".to_string(), json!({"value": 3, "dirty": false}));
        states.insert("loop".to_string(), loop_state);

        let cp = ExecutionCheckpoint::new("run-1", "loop").with_node_states(states);
        let text = serde_json::to_string(&cp).unwrap();
        let restored: ExecutionCheckpoint = serde_json::from_str(&text).unwrap();

        let restored_loop = &restored.node_states["loop"];
        assert_eq!(restored_loop["private:index"], json!(4));
        assert_eq!(restored_loop["out:index"]["value"], json!(3));
    }
}
