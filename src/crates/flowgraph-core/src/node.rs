//! Nodes and the compute contract
//!
//! A [`Node`] is an addressable computation unit: stable id, port bags, a
//! flow-control flag, and a behavior implementing [`NodeBehavior::compute`].
//! `compute` receives a [`ComputeContext`] holding copies of the current
//! input values — it can never reach the arena or other nodes, so port
//! writes across a concurrent batch are disjoint by construction. The
//! executor applies the returned [`ExecutionResult`] to the arena.
//!
//! Node state (every port value plus behavior-private transient fields)
//! serializes to a flat map with namespaced keys — `in:<port>`,
//! `out:<port>`, `private:<field>` — consumed by checkpoint snapshots.

use crate::error::{GraphError, Result};
use crate::port::{Port, PortFunction};
use crate::result::ExecutionResult;
use async_trait::async_trait;
use flowgraph_checkpoint::NodeStateMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Stable node identifier.
pub type NodeId = String;

/// Type tag of subgraph container nodes.
pub const SUBGRAPH_KIND: &str = "subgraph";

/// Inputs handed to a node's `compute`, by value.
#[derive(Debug, Clone)]
pub struct ComputeContext {
    /// Run the invocation belongs to.
    pub run_id: String,
    /// Id of the node being computed.
    pub node_id: NodeId,
    /// Subgraph scope of the node, if any.
    pub subgraph_id: Option<NodeId>,
    /// Absolute node path (`/root/sub:leaf`).
    pub node_path: String,
    /// Current values of the node's data input ports.
    pub data_inputs: BTreeMap<String, Value>,
    /// Current values of the node's control input ports.
    pub control_inputs: BTreeMap<String, Value>,
}

impl ComputeContext {
    /// Value of a data input, if present.
    pub fn data(&self, port: &str) -> Option<&Value> {
        self.data_inputs.get(port)
    }

    /// Value of a data input, or a `NodeExecution` error naming the port.
    pub fn require_data(&self, port: &str) -> Result<&Value> {
        self.data_inputs.get(port).ok_or_else(|| {
            GraphError::node_execution(&self.node_id, format!("missing data input '{}'", port))
        })
    }

    /// Whether a control input carries an activation.
    pub fn is_activated(&self, port: &str) -> bool {
        self.control_inputs
            .get(port)
            .map(|v| !v.is_null() && *v != Value::Bool(false))
            .unwrap_or(false)
    }
}

/// The compute contract a node kind implements.
///
/// Implementations must be reentrant across distinct runs; transient state
/// (a loop cursor, an accumulator) lives behind interior mutability and is
/// exposed through [`NodeBehavior::private_state`] so checkpoints can
/// capture it.
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    /// Compute the node. Must not touch anything but the values in `ctx`
    /// and the behavior's own private state.
    async fn compute(&self, ctx: ComputeContext) -> Result<ExecutionResult>;

    /// Behavior-private transient fields to include in checkpoints. Use
    /// explicit flags (`loop_active: bool`) rather than sentinel values so
    /// restore is unambiguous.
    fn private_state(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    /// Restore behavior-private fields from a checkpoint snapshot.
    fn restore_private_state(&self, _state: &BTreeMap<String, Value>) {}
}

/// Addressable computation unit in a graph.
#[derive(Clone)]
pub struct Node {
    /// Stable id, unique within the arena.
    pub id: NodeId,
    /// Display name, used in paths.
    pub name: String,
    /// Type tag (`"for_loop"`, `"subgraph"`, ...).
    pub kind: String,
    /// Owning subgraph; `None` only for the root subgraph node.
    pub parent: Option<NodeId>,
    /// Input ports by name.
    pub inputs: BTreeMap<String, Port>,
    /// Output ports by name.
    pub outputs: BTreeMap<String, Port>,
    /// True for nodes that may emit control outputs or return a
    /// non-CONTINUE command.
    pub flow_control: bool,
    /// True while the node's outputs do not reflect the current run.
    pub dirty: bool,
    behavior: Arc<dyn NodeBehavior>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .field("flow_control", &self.flow_control)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Node {
    /// Create a node with the given identity and behavior.
    pub fn new(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        kind: impl Into<String>,
        behavior: Arc<dyn NodeBehavior>,
    ) -> Self {
        let id = id.into();
        Self {
            id,
            name: name.into(),
            kind: kind.into(),
            parent: None,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            flow_control: false,
            dirty: true,
            behavior,
        }
    }

    /// Set the owning subgraph.
    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add an input port.
    pub fn with_input(mut self, port: Port) -> Self {
        self.inputs.insert(port.name.clone(), port);
        self
    }

    /// Add an output port.
    pub fn with_output(mut self, port: Port) -> Self {
        self.outputs.insert(port.name.clone(), port);
        self
    }

    /// Mark the node as flow-control.
    pub fn with_flow_control(mut self, flow_control: bool) -> Self {
        self.flow_control = flow_control;
        self
    }

    /// The node's behavior, shared.
    pub fn behavior(&self) -> Arc<dyn NodeBehavior> {
        Arc::clone(&self.behavior)
    }

    /// True for subgraph container nodes.
    pub fn is_subgraph(&self) -> bool {
        self.kind == SUBGRAPH_KIND
    }

    /// Look up a port by name, inputs first.
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.inputs.get(name).or_else(|| self.outputs.get(name))
    }

    /// Mutable port lookup, inputs first.
    pub fn port_mut(&mut self, name: &str) -> Option<&mut Port> {
        if self.inputs.contains_key(name) {
            self.inputs.get_mut(name)
        } else {
            self.outputs.get_mut(name)
        }
    }

    /// Current values of data-function input ports.
    pub fn data_input_values(&self) -> BTreeMap<String, Value> {
        self.inputs
            .iter()
            .filter(|(_, p)| p.function == PortFunction::Data)
            .filter_map(|(name, p)| p.value.clone().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Current values of control-function input ports.
    pub fn control_input_values(&self) -> BTreeMap<String, Value> {
        self.inputs
            .iter()
            .filter(|(_, p)| p.function == PortFunction::Control)
            .filter_map(|(name, p)| p.value.clone().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Serialize all port values plus behavior-private fields, keyed
    /// `in:<port>` / `out:<port>` / `private:<field>`.
    pub fn serialize_state(&self) -> NodeStateMap {
        let mut state = NodeStateMap::new();
        for (name, port) in &self.inputs {
            state.insert(format!("in:{}", name), port.snapshot());
        }
        for (name, port) in &self.outputs {
            state.insert(format!("out:{}", name), port.snapshot());
        }
        for (field, value) in self.behavior.private_state() {
            state.insert(format!("private:{}", field), value);
        }
        state
    }

    /// Restore port values and behavior-private fields from a
    /// [`Node::serialize_state`] map. Unknown ports are ignored so a
    /// checkpoint from a slightly different graph revision still restores
    /// what it can; a port entry that does not match the snapshot shape
    /// fails with `MalformedSnapshot`.
    pub fn restore_state(&mut self, state: &NodeStateMap) -> Result<()> {
        let mut private = BTreeMap::new();
        for (key, value) in state {
            if let Some(name) = key.strip_prefix("in:") {
                if let Some(port) = self.inputs.get_mut(name) {
                    port.restore(value)?;
                }
            } else if let Some(name) = key.strip_prefix("out:") {
                if let Some(port) = self.outputs.get_mut(name) {
                    port.restore(value)?;
                }
            } else if let Some(field) = key.strip_prefix("private:") {
                private.insert(field.to_string(), value.clone());
            }
        }
        self.behavior.restore_private_state(&private);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;
    use serde_json::json;
    use std::sync::Mutex;

    struct Stub;

    #[async_trait]
    impl NodeBehavior for Stub {
        async fn compute(&self, _ctx: ComputeContext) -> Result<ExecutionResult> {
            Ok(ExecutionResult::proceed())
        }
    }

    struct WithPrivate {
        cursor: Mutex<i64>,
    }

    #[async_trait]
    impl NodeBehavior for WithPrivate {
        async fn compute(&self, _ctx: ComputeContext) -> Result<ExecutionResult> {
            Ok(ExecutionResult::proceed())
        }

        fn private_state(&self) -> BTreeMap<String, Value> {
            let cursor = *self.cursor.lock().unwrap();
            BTreeMap::from([("cursor".to_string(), json!(cursor))])
        }

        fn restore_private_state(&self, state: &BTreeMap<String, Value>) {
            if let Some(cursor) = state.get("cursor").and_then(Value::as_i64) {
                *self.cursor.lock().unwrap() = cursor;
            }
        }
    }

    fn sample_node() -> Node {
        Node::new("a", "A", "fn", Arc::new(Stub))
            .with_input(Port::data_in("val", ValueType::Int))
            .with_input(Port::control_in("exec"))
            .with_output(Port::data_out("out", ValueType::Int))
    }

    #[test]
    fn test_input_value_maps_split_by_function() {
        let mut node = sample_node();
        node.inputs.get_mut("val").unwrap().set_value(json!(3));
        node.inputs.get_mut("exec").unwrap().set_value(json!(true));

        let data = node.data_input_values();
        assert_eq!(data.len(), 1);
        assert_eq!(data["val"], json!(3));

        let control = node.control_input_values();
        assert_eq!(control.len(), 1);
        assert_eq!(control["exec"], json!(true));
    }

    #[test]
    fn test_serialize_state_namespaces_keys() {
        let mut node = sample_node();
        node.inputs.get_mut("val").unwrap().set_value(json!(3));
        node.outputs.get_mut("out").unwrap().commit_value(json!(6));

        let state = node.serialize_state();
        assert_eq!(state["in:val"]["value"], json!(3));
        assert_eq!(state["out:out"]["value"], json!(6));
        assert_eq!(state["out:out"]["dirty"], json!(false));
        assert!(state.contains_key("in:exec"));
    }

    #[test]
    fn test_state_round_trip_with_private_fields() {
        let behavior = Arc::new(WithPrivate {
            cursor: Mutex::new(4),
        });
        let mut node = Node::new("loop", "Loop", "for_loop", behavior.clone())
            .with_output(Port::data_out("index", ValueType::Int));
        node.outputs.get_mut("index").unwrap().commit_value(json!(3));

        let state = node.serialize_state();
        assert_eq!(state["private:cursor"], json!(4));

        *behavior.cursor.lock().unwrap() = 0;
        node.outputs.get_mut("index").unwrap().set_value(json!(99));

        node.restore_state(&state).unwrap();
        assert_eq!(*behavior.cursor.lock().unwrap(), 4);
        assert_eq!(node.outputs["index"].value, Some(json!(3)));
        assert!(!node.outputs["index"].dirty);
    }

    #[test]
    fn test_restore_state_surfaces_malformed_entries() {
        let mut node = sample_node();
        let mut state = NodeStateMap::new();
        state.insert("in:val".to_string(), json!(3));

        let err = node.restore_state(&state).unwrap_err();
        assert!(matches!(
            err,
            GraphError::MalformedSnapshot { ref port, .. } if port == "val"
        ));
    }

    #[test]
    fn test_require_data_reports_missing_port() {
        let ctx = ComputeContext {
            run_id: "run".into(),
            node_id: "a".into(),
            subgraph_id: None,
            node_path: "/root:A".into(),
            data_inputs: BTreeMap::new(),
            control_inputs: BTreeMap::new(),
        };
        let err = ctx.require_data("val").unwrap_err();
        assert!(err.to_string().contains("missing data input 'val'"));
    }

    #[test]
    fn test_is_activated() {
        let ctx = ComputeContext {
            run_id: "run".into(),
            node_id: "a".into(),
            subgraph_id: None,
            node_path: "/root:A".into(),
            data_inputs: BTreeMap::new(),
            control_inputs: BTreeMap::from([
                ("exec".to_string(), json!(true)),
                ("off".to_string(), json!(false)),
            ]),
        };
        assert!(ctx.is_activated("exec"));
        assert!(!ctx.is_activated("off"));
        assert!(!ctx.is_activated("absent"));
    }
}
