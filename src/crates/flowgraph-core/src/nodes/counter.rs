//! Counting sink
//!
//! Control-driven probe that counts its activations and remembers the last
//! value seen on `val`. Used as the measuring endpoint of loop bodies; both
//! fields serialize into checkpoints so a resumed run keeps counting where
//! it left off.

use crate::node::{ComputeContext, Node, NodeBehavior};
use crate::port::Port;
use crate::result::ExecutionResult;
use crate::value::ValueType;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
struct CounterState {
    count: u64,
    last: Option<Value>,
}

/// Counts invocations; a data node driven by a control input.
#[derive(Default)]
pub struct CounterBehavior {
    state: Mutex<CounterState>,
}

impl CounterBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations so far.
    pub fn count(&self) -> u64 {
        self.lock().count
    }

    /// Last value observed on `val`, if any.
    pub fn last(&self) -> Option<Value> {
        self.lock().last.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CounterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NodeBehavior for CounterBehavior {
    async fn compute(&self, ctx: ComputeContext) -> crate::error::Result<ExecutionResult> {
        let mut state = self.lock();
        state.count += 1;
        if let Some(val) = ctx.data("val") {
            state.last = Some(val.clone());
        }
        let mut result = ExecutionResult::proceed().with_data("count", json!(state.count));
        if let Some(last) = &state.last {
            result = result.with_data("last", last.clone());
        }
        Ok(result)
    }

    fn private_state(&self) -> BTreeMap<String, Value> {
        let state = self.lock();
        BTreeMap::from([
            ("count".to_string(), json!(state.count)),
            (
                "last".to_string(),
                state.last.clone().unwrap_or(Value::Null),
            ),
        ])
    }

    fn restore_private_state(&self, snapshot: &BTreeMap<String, Value>) {
        let mut state = self.lock();
        if let Some(count) = snapshot.get("count").and_then(Value::as_u64) {
            state.count = count;
        }
        match snapshot.get("last") {
            Some(Value::Null) | None => {}
            Some(last) => state.last = Some(last.clone()),
        }
    }
}

/// Build a counting sink node.
pub fn counter_node(id: impl Into<String>, name: impl Into<String>) -> Node {
    Node::new(id, name, "counter", Arc::new(CounterBehavior::new()))
        .with_input(Port::control_in("exec"))
        .with_input(Port::data_in("val", ValueType::Any))
        .with_output(Port::data_out("count", ValueType::Int))
        .with_output(Port::data_out("last", ValueType::Any))
}
