//! Closure-bodied data nodes

use crate::error::Result;
use crate::node::{ComputeContext, Node, NodeBehavior};
use crate::port::Port;
use crate::result::ExecutionResult;
use crate::value::ValueType;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Body of an [`FnBehavior`]: maps the context's inputs to data outputs.
pub type FnBody = Arc<dyn Fn(&ComputeContext) -> Result<BTreeMap<String, Value>> + Send + Sync>;

/// Pure data node backed by a closure. Always returns `CONTINUE` and never
/// drives control edges.
pub struct FnBehavior {
    body: FnBody,
}

impl FnBehavior {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&ComputeContext) -> Result<BTreeMap<String, Value>> + Send + Sync + 'static,
    {
        Self {
            body: Arc::new(body),
        }
    }
}

#[async_trait]
impl NodeBehavior for FnBehavior {
    async fn compute(&self, ctx: ComputeContext) -> Result<ExecutionResult> {
        let outputs = (self.body)(&ctx)?;
        let mut result = ExecutionResult::proceed();
        for (port, value) in outputs {
            result = result.with_data(port, value);
        }
        Ok(result)
    }
}

/// Build the common single-input (`val`) single-output (`out`) shape around
/// a closure. Other port layouts are assembled directly on [`Node`].
pub fn fn_node<F>(id: impl Into<String>, name: impl Into<String>, body: F) -> Node
where
    F: Fn(&ComputeContext) -> Result<BTreeMap<String, Value>> + Send + Sync + 'static,
{
    Node::new(id, name, "fn", Arc::new(FnBehavior::new(body)))
        .with_input(Port::data_in("val", ValueType::Any))
        .with_output(Port::data_out("out", ValueType::Any))
}
