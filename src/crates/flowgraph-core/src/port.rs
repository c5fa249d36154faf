//! Typed connection points on nodes
//!
//! A port carries a direction (in / out / in-out), a function (data or
//! control), a value-type tag, the current value, and a dirty flag. The
//! dirty flag is true while the value does not yet reflect an upstream
//! computation of the current run; the executor clears it when it commits a
//! propagated or computed value.
//!
//! In-out ports only appear on subgraph nodes, where they tunnel values
//! between the outer and inner scopes.

use crate::error::{GraphError, Result};
use crate::value::ValueType;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Which way values flow through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortDirection {
    In,
    Out,
    /// Tunneling port on a subgraph node; has an outer face and an inner
    /// face.
    InOut,
}

/// What a port carries: values or execution signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortFunction {
    Data,
    Control,
}

/// Named connection point on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique within its bag (inputs or outputs).
    pub name: String,
    pub direction: PortDirection,
    pub function: PortFunction,
    pub value_type: ValueType,
    /// Current value, if any has been written.
    pub value: Option<Value>,
    /// True while the value does not reflect an upstream computation of the
    /// current run.
    pub dirty: bool,
}

impl Port {
    /// Create a port with an explicit direction and function.
    pub fn new(name: impl Into<String>, direction: PortDirection, function: PortFunction) -> Self {
        Self {
            name: name.into(),
            direction,
            function,
            value_type: ValueType::Any,
            value: None,
            dirty: true,
        }
    }

    /// Data input on a leaf node.
    pub fn data_in(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, PortDirection::In, PortFunction::Data).with_value_type(value_type)
    }

    /// Data output on a leaf node.
    pub fn data_out(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, PortDirection::Out, PortFunction::Data).with_value_type(value_type)
    }

    /// Control input on a leaf node. A control input is a union of
    /// activations and may be driven by several control edges.
    pub fn control_in(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::In, PortFunction::Control)
    }

    /// Control output on a leaf node.
    pub fn control_out(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Out, PortFunction::Control)
    }

    /// Tunneling port for a subgraph node.
    pub fn tunnel(name: impl Into<String>, function: PortFunction) -> Self {
        Self::new(name, PortDirection::InOut, function)
    }

    /// Set the value-type tag.
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Preset a value at construction time (e.g. a constant input). The
    /// port stays dirty: the value did not come from an upstream
    /// computation.
    pub fn with_value(mut self, value: Value) -> Self {
        self.check_type(&value);
        self.value = Some(value);
        self
    }

    /// Write a value from outside the run (configuration, manual edits).
    ///
    /// Type mismatches are diagnostics, never errors.
    pub fn set_value(&mut self, value: Value) {
        self.check_type(&value);
        self.value = Some(value);
        self.dirty = true;
    }

    /// Write a value produced by an upstream computation of the current
    /// run; clears the dirty flag.
    pub fn commit_value(&mut self, value: Value) {
        self.check_type(&value);
        self.value = Some(value);
        self.dirty = false;
    }

    /// Mark the value as not reflecting the current run.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// True for in-out tunneling ports.
    pub fn is_tunnel(&self) -> bool {
        self.direction == PortDirection::InOut
    }

    /// Snapshot entry for checkpointing: `{ "value": ..., "dirty": ... }`.
    ///
    /// The dirty flag is explicit so a restore never has to guess from a
    /// null value.
    pub fn snapshot(&self) -> Value {
        json!({
            "value": self.value.clone().unwrap_or(Value::Null),
            "dirty": self.dirty,
        })
    }

    /// Restore from a [`Port::snapshot`] entry.
    ///
    /// The entry must be the exact `{ "value": ..., "dirty": ... }` shape
    /// snapshots produce; anything else fails with `MalformedSnapshot` so
    /// a truncated or foreign checkpoint surfaces instead of restoring
    /// silently wrong state.
    pub fn restore(&mut self, entry: &Value) -> Result<()> {
        let map = entry
            .as_object()
            .ok_or_else(|| self.malformed("entry is not an object"))?;
        let value = map
            .get("value")
            .ok_or_else(|| self.malformed("missing 'value' field"))?;
        let dirty = map
            .get("dirty")
            .and_then(Value::as_bool)
            .ok_or_else(|| self.malformed("missing or non-boolean 'dirty' flag"))?;
        self.value = if value.is_null() {
            None
        } else {
            Some(value.clone())
        };
        self.dirty = dirty;
        Ok(())
    }

    fn malformed(&self, reason: &str) -> GraphError {
        GraphError::MalformedSnapshot {
            port: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn check_type(&self, value: &Value) {
        if !self.value_type.conforms(value) {
            tracing::warn!(
                port = %self.name,
                expected = ?self.value_type,
                got = %value,
                "Type mismatch on port write"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_port_is_dirty_and_empty() {
        let port = Port::data_in("val", ValueType::Int);
        assert!(port.dirty);
        assert!(port.value.is_none());
        assert_eq!(port.function, PortFunction::Data);
        assert_eq!(port.direction, PortDirection::In);
    }

    #[test]
    fn test_commit_clears_dirty() {
        let mut port = Port::data_out("out", ValueType::Int);
        port.commit_value(json!(6));
        assert!(!port.dirty);
        assert_eq!(port.value, Some(json!(6)));

        port.mark_dirty();
        assert!(port.dirty);
    }

    #[test]
    fn test_set_value_keeps_dirty() {
        let mut port = Port::data_in("val", ValueType::Int);
        port.set_value(json!(3));
        assert!(port.dirty);
        assert_eq!(port.value, Some(json!(3)));
    }

    #[test]
    fn test_mismatched_write_is_stored_anyway() {
        // Soft contract: the diagnostic is logged, the value lands.
        let mut port = Port::data_in("val", ValueType::Int);
        port.set_value(json!("not a number"));
        assert_eq!(port.value, Some(json!("not a number")));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut port = Port::data_out("out", ValueType::Int);
        port.commit_value(json!(12));

        let entry = port.snapshot();
        let mut restored = Port::data_out("out", ValueType::Int);
        restored.restore(&entry).unwrap();

        assert_eq!(restored.value, Some(json!(12)));
        assert!(!restored.dirty);
    }

    #[test]
    fn test_snapshot_of_empty_port() {
        let port = Port::data_in("val", ValueType::Any);
        let entry = port.snapshot();
        assert_eq!(entry["value"], Value::Null);
        assert_eq!(entry["dirty"], json!(true));

        let mut restored = Port::data_in("val", ValueType::Any);
        restored.restore(&entry).unwrap();
        assert!(restored.value.is_none());
        assert!(restored.dirty);
    }

    #[test]
    fn test_restore_rejects_malformed_entries() {
        let mut port = Port::data_in("val", ValueType::Any);

        // A bare value is not a snapshot entry.
        let err = port.restore(&json!(7)).unwrap_err();
        assert!(matches!(
            &err,
            crate::error::GraphError::MalformedSnapshot { port, .. } if port == "val"
        ));

        // Object shape without the dirty flag is truncated.
        let err = port.restore(&json!({"value": 7})).unwrap_err();
        assert!(err.to_string().contains("dirty"));

        // Nothing was applied.
        assert!(port.value.is_none());
        assert!(port.dirty);
    }

    #[test]
    fn test_tunnel_port() {
        let port = Port::tunnel("tunnel_data", PortFunction::Data);
        assert!(port.is_tunnel());
        assert_eq!(port.function, PortFunction::Data);
    }
}
