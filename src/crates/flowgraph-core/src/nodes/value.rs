//! Constant data source

use crate::node::{ComputeContext, Node, NodeBehavior};
use crate::port::Port;
use crate::result::ExecutionResult;
use crate::value::ValueType;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Emits a fixed value on `out`. A value node has no inputs, so the
/// dependency resolver collapses it into the ready batch in one step.
pub struct ValueBehavior {
    value: Value,
}

impl ValueBehavior {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

#[async_trait]
impl NodeBehavior for ValueBehavior {
    async fn compute(&self, _ctx: ComputeContext) -> crate::error::Result<ExecutionResult> {
        Ok(ExecutionResult::proceed().with_data("out", self.value.clone()))
    }
}

/// Build a constant-source node.
pub fn value_node(id: impl Into<String>, name: impl Into<String>, value: Value) -> Node {
    Node::new(id, name, "value", Arc::new(ValueBehavior::new(value)))
        .with_output(Port::data_out("out", ValueType::Any))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_emits_configured_value() {
        let node = value_node("v", "Three", json!(3));
        let ctx = ComputeContext {
            run_id: "run".into(),
            node_id: "v".into(),
            subgraph_id: None,
            node_path: "/root:Three".into(),
            data_inputs: BTreeMap::new(),
            control_inputs: BTreeMap::new(),
        };
        let result = node.behavior().compute(ctx).await.unwrap();
        assert_eq!(result.data_outputs["out"], json!(3));
    }
}
