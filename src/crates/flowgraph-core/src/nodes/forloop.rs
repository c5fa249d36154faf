//! Bounded loop node
//!
//! Iterates `start..end`. Each pass emits the current index on the `index`
//! data output, fires the `loop_body` control output, and returns
//! `LOOP_AGAIN` so the scheduler defers the re-entry until the body pass
//! drains. When the cursor reaches `end` the node fires `completed` and
//! returns `COMPLETED`.
//!
//! The cursor is behavior-private transient state and is exposed through
//! the checkpoint snapshot with an explicit `loop_active` flag, so a
//! restored run resumes mid-iteration without guessing.

use crate::node::{ComputeContext, Node, NodeBehavior};
use crate::port::Port;
use crate::result::ExecutionResult;
use crate::value::ValueType;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
struct LoopState {
    active: bool,
    index: i64,
}

/// `for i in start..end` with the LOOP_AGAIN / COMPLETED protocol.
pub struct ForLoopBehavior {
    start: i64,
    end: i64,
    state: Mutex<LoopState>,
}

impl ForLoopBehavior {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            state: Mutex::new(LoopState {
                active: false,
                index: start,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NodeBehavior for ForLoopBehavior {
    async fn compute(&self, _ctx: ComputeContext) -> crate::error::Result<ExecutionResult> {
        let mut state = self.lock();
        if !state.active {
            state.active = true;
            state.index = self.start;
        }
        if state.index < self.end {
            let index = state.index;
            state.index += 1;
            Ok(ExecutionResult::loop_again()
                .with_data("index", json!(index))
                .with_control("loop_body", json!(true)))
        } else {
            state.active = false;
            Ok(ExecutionResult::completed().with_control("completed", json!(true)))
        }
    }

    fn private_state(&self) -> BTreeMap<String, Value> {
        let state = self.lock();
        BTreeMap::from([
            ("loop_active".to_string(), json!(state.active)),
            ("index".to_string(), json!(state.index)),
        ])
    }

    fn restore_private_state(&self, snapshot: &BTreeMap<String, Value>) {
        let mut state = self.lock();
        if let Some(active) = snapshot.get("loop_active").and_then(Value::as_bool) {
            state.active = active;
        }
        if let Some(index) = snapshot.get("index").and_then(Value::as_i64) {
            state.index = index;
        }
    }
}

/// Build a loop node iterating `start..end`.
pub fn for_loop_node(
    id: impl Into<String>,
    name: impl Into<String>,
    start: i64,
    end: i64,
) -> Node {
    Node::new(id, name, "for_loop", Arc::new(ForLoopBehavior::new(start, end)))
        .with_input(Port::control_in("exec"))
        .with_output(Port::data_out("index", ValueType::Int))
        .with_output(Port::control_out("loop_body"))
        .with_output(Port::control_out("completed"))
        .with_flow_control(true)
}
