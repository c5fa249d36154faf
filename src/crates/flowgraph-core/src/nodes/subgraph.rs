//! Subgraph container nodes
//!
//! A subgraph is a node whose ports are all in-out tunnels and whose
//! children carry its id as their parent. The container itself computes
//! nothing — the executor relays values through the tunnel ports during
//! propagation — so its behavior is inert.

use crate::node::{ComputeContext, Node, NodeBehavior, SUBGRAPH_KIND};
use crate::result::ExecutionResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Inert behavior of subgraph container nodes.
pub struct SubgraphBehavior;

#[async_trait]
impl NodeBehavior for SubgraphBehavior {
    async fn compute(&self, _ctx: ComputeContext) -> crate::error::Result<ExecutionResult> {
        Ok(ExecutionResult::proceed())
    }
}

/// Build a subgraph container node. Tunnel ports are added by the caller
/// with [`crate::port::Port::tunnel`]; children point at this node's id
/// via their `parent` field.
pub fn subgraph_node(id: impl Into<String>, name: impl Into<String>) -> Node {
    Node::new(id, name, SUBGRAPH_KIND, Arc::new(SubgraphBehavior)).with_flow_control(true)
}
