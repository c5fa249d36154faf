//! Explicit node-kind factory
//!
//! Node types are not discovered through global state; a [`NodeRegistry`] is
//! an explicit lookup table of `kind -> factory` passed into whatever builds
//! graphs. No statics, no cross-test bleed-through.
//!
//! Closure-bodied nodes (see [`crate::nodes::FnBehavior`]) are constructed
//! directly — closures have no serializable parameters — so the registry
//! covers the parameterizable kinds.

use crate::error::{GraphError, Result};
use crate::node::Node;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a node from `(id, name, params)`.
pub type NodeFactory = Arc<dyn Fn(&str, &str, &Value) -> Result<Node> + Send + Sync>;

/// Lookup table of node factories by kind.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in kinds (`value`, `for_loop`,
    /// `counter`, `subgraph`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::nodes::register_builtins(&mut registry);
        registry
    }

    /// Register a factory for a kind. Fails with `DuplicateKind` if the
    /// kind is already present.
    pub fn register(&mut self, kind: impl Into<String>, factory: NodeFactory) -> Result<()> {
        let kind = kind.into();
        if self.factories.contains_key(&kind) {
            return Err(GraphError::DuplicateKind(kind));
        }
        self.factories.insert(kind, factory);
        Ok(())
    }

    /// Register a factory, replacing any earlier entry of the same kind.
    pub fn register_or_replace(&mut self, kind: impl Into<String>, factory: NodeFactory) {
        self.factories.insert(kind.into(), factory);
    }

    /// Whether a kind is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Build a node of the given kind. Fails with `UnknownKind` if no
    /// factory is registered.
    pub fn build(&self, kind: &str, id: &str, name: &str, params: &Value) -> Result<Node> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| GraphError::UnknownKind(kind.to_string()))?;
        factory(id, name, params)
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
