//! Built-in node behaviors
//!
//! The packaged node kinds: constant sources, closure-bodied data nodes,
//! the for-loop, the counting probe, and the inert subgraph container.
//! Everything parameterizable registers into a [`NodeRegistry`] through
//! [`register_builtins`].

mod counter;
mod forloop;
mod func;
mod subgraph;
mod value;

pub use counter::{counter_node, CounterBehavior};
pub use forloop::{for_loop_node, ForLoopBehavior};
pub use func::{fn_node, FnBehavior, FnBody};
pub use subgraph::{subgraph_node, SubgraphBehavior};
pub use value::{value_node, ValueBehavior};

use crate::registry::NodeRegistry;
use serde_json::Value;
use std::sync::Arc;

/// Register the built-in kinds (`value`, `for_loop`, `counter`,
/// `subgraph`) into a registry, replacing earlier entries of the same
/// name.
pub fn register_builtins(registry: &mut NodeRegistry) {
    registry.register_or_replace(
        "value",
        Arc::new(|id, name, params| {
            let value = params.get("value").cloned().unwrap_or(Value::Null);
            Ok(value_node(id, name, value))
        }),
    );
    registry.register_or_replace(
        "for_loop",
        Arc::new(|id, name, params| {
            let start = params.get("start").and_then(Value::as_i64).unwrap_or(0);
            let end = params.get("end").and_then(Value::as_i64).unwrap_or(0);
            Ok(for_loop_node(id, name, start, end))
        }),
    );
    registry.register_or_replace("counter", Arc::new(|id, name, _params| Ok(counter_node(id, name))));
    registry.register_or_replace(
        "subgraph",
        Arc::new(|id, name, _params| Ok(subgraph_node(id, name))),
    );
}
