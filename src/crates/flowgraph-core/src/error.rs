//! Error types for graph construction and execution
//!
//! All errors implement `std::error::Error` via `thiserror`. Graph-shape
//! errors (`DuplicateId`, `NotFound`, `EdgeRejected`, `InvalidPath`) are
//! raised synchronously by [`crate::arena::GraphArena`] and are never
//! recovered internally. Run errors surface out of the executor:
//! `NodeExecution` after an error checkpoint has been emitted,
//! `UnsatisfiedDependency` when the run drains with nodes still waiting on
//! dependencies (a wiring bug). Type mismatches on port writes are a soft
//! diagnostic only — logged, never raised.

use thiserror::Error;

/// Convenience result type using [`GraphError`].
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised by graph construction and execution.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A node with this id already exists in the arena.
    #[error("Duplicate node id: '{0}'")]
    DuplicateId(String),

    /// No node with this id exists in the arena.
    #[error("Node not found: '{0}'")]
    NotFound(String),

    /// The edge violates a wiring invariant.
    ///
    /// Raised when a data input already has a producer, when the endpoint
    /// port functions disagree, when a port is used against its direction,
    /// or when the endpoints live in different subgraph scopes.
    #[error("Edge rejected ({from}.{from_port} -> {to}.{to_port}): {reason}")]
    EdgeRejected {
        from: String,
        from_port: String,
        to: String,
        to_port: String,
        reason: String,
    },

    /// A node path string does not match the path grammar or names a node
    /// that does not exist.
    #[error("Invalid node path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The run drained both the ready batch and the deferred stack while
    /// nodes were still waiting on dependencies. Cyclic data edges or a
    /// control output that never fires.
    #[error("Unsatisfied dependencies at end of run: {nodes:?}")]
    UnsatisfiedDependency { nodes: Vec<String> },

    /// A node's `compute` failed. An error checkpoint capturing the failed
    /// batch has been emitted before this surfaces.
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution {
        /// Id of the node that failed.
        node: String,
        /// Error message from node execution.
        error: String,
    },

    /// The run exceeded the configured batch limit. Almost always a loop
    /// whose exit condition never fires.
    #[error("Run exceeded the batch limit of {limit}")]
    BatchLimitExceeded { limit: usize },

    /// A node kind was registered twice in the same registry.
    #[error("Node kind already registered: '{0}'")]
    DuplicateKind(String),

    /// A factory lookup named a kind the registry does not hold.
    #[error("Unknown node kind: '{0}'")]
    UnknownKind(String),

    /// A per-node snapshot entry in a checkpoint does not match the
    /// `{value, dirty}` wire shape. The checkpoint is corrupt or was
    /// produced by something other than this engine.
    #[error("Malformed snapshot entry for port '{port}': {reason}")]
    MalformedSnapshot { port: String, reason: String },

    /// Checkpoint persistence or resume-admission error.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] flowgraph_checkpoint::CheckpointError),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Create a node execution error with context.
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Create an edge rejection with context.
    pub fn edge_rejected(
        from: impl Into<String>,
        from_port: impl Into<String>,
        to: impl Into<String>,
        to_port: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::EdgeRejected {
            from: from.into(),
            from_port: from_port.into(),
            to: to.into(),
            to_port: to_port.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-path error with context.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
