//! Node execution results
//!
//! Every `compute` invocation produces an [`ExecutionResult`]: a command
//! telling the scheduler what the node intends next, plus the data and
//! control outputs to propagate. The identity fields (run, node, subgraph,
//! path) are stamped by the executor for trace correlation and carry no
//! scheduling meaning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Scheduling verdict of one `compute` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionCommand {
    /// Normal completion. Data nodes always return this.
    Continue,
    /// Park the node until external input arrives; no outputs are
    /// propagated and no retry is scheduled.
    Wait,
    /// The node intends to execute again once the current body pass
    /// completes; it is pushed onto the deferred stack.
    LoopAgain,
    /// Normal loop exit; outputs propagate like `Continue`.
    Completed,
}

/// Outputs and verdict of one `compute` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// What the scheduler should do with this node next.
    pub command: ExecutionCommand,

    /// Values to commit to the node's data output ports and propagate
    /// along outgoing data edges.
    pub data_outputs: BTreeMap<String, Value>,

    /// Activation values to propagate along outgoing control edges.
    pub control_outputs: BTreeMap<String, Value>,

    /// Run the result belongs to (trace correlation only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Node that produced the result (trace correlation only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    /// Subgraph scope of the node (trace correlation only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgraph_id: Option<String>,

    /// Absolute node path (trace correlation only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_path: Option<String>,
}

impl ExecutionResult {
    /// Result with the given command and no outputs.
    pub fn new(command: ExecutionCommand) -> Self {
        Self {
            command,
            data_outputs: BTreeMap::new(),
            control_outputs: BTreeMap::new(),
            run_id: None,
            node_id: None,
            subgraph_id: None,
            node_path: None,
        }
    }

    /// `CONTINUE` with no outputs.
    pub fn proceed() -> Self {
        Self::new(ExecutionCommand::Continue)
    }

    /// `LOOP_AGAIN` with no outputs.
    pub fn loop_again() -> Self {
        Self::new(ExecutionCommand::LoopAgain)
    }

    /// `COMPLETED` with no outputs.
    pub fn completed() -> Self {
        Self::new(ExecutionCommand::Completed)
    }

    /// `WAIT` with no outputs.
    pub fn wait() -> Self {
        Self::new(ExecutionCommand::Wait)
    }

    /// Add a data output.
    pub fn with_data(mut self, port: impl Into<String>, value: Value) -> Self {
        self.data_outputs.insert(port.into(), value);
        self
    }

    /// Add a control activation.
    pub fn with_control(mut self, port: impl Into<String>, value: Value) -> Self {
        self.control_outputs.insert(port.into(), value);
        self
    }

    /// True when the result carries no outputs at all.
    pub fn is_empty(&self) -> bool {
        self.data_outputs.is_empty() && self.control_outputs.is_empty()
    }

    /// Stamp the trace-correlation identity. Called by the executor.
    pub(crate) fn stamp_identity(
        &mut self,
        run_id: &str,
        node_id: &str,
        subgraph_id: Option<&str>,
        node_path: &str,
    ) {
        self.run_id = Some(run_id.to_string());
        self.node_id = Some(node_id.to_string());
        self.subgraph_id = subgraph_id.map(str::to_string);
        self.node_path = Some(node_path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_builders() {
        let result = ExecutionResult::loop_again()
            .with_data("index", json!(2))
            .with_control("loop_body", json!(true));

        assert_eq!(result.command, ExecutionCommand::LoopAgain);
        assert_eq!(result.data_outputs["index"], json!(2));
        assert_eq!(result.control_outputs["loop_body"], json!(true));
        assert!(!result.is_empty());
    }

    #[test]
    fn test_empty_result() {
        assert!(ExecutionResult::proceed().is_empty());
        assert!(ExecutionResult::wait().is_empty());
    }

    #[test]
    fn test_command_wire_names() {
        assert_eq!(
            serde_json::to_string(&ExecutionCommand::LoopAgain).unwrap(),
            "\"LOOP_AGAIN\""
        );
        assert_eq!(
            serde_json::to_string(&ExecutionCommand::Continue).unwrap(),
            "\"CONTINUE\""
        );
        let cmd: ExecutionCommand = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(cmd, ExecutionCommand::Completed);
    }

    #[test]
    fn test_identity_is_skipped_when_unset() {
        let text = serde_json::to_string(&ExecutionResult::proceed()).unwrap();
        assert!(!text.contains("run_id"));
        assert!(!text.contains("node_path"));
    }

    #[test]
    fn test_result_round_trip() {
        let result = ExecutionResult::completed().with_control("completed", json!(true));
        let text = serde_json::to_string(&result).unwrap();
        let restored: ExecutionResult = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.command, ExecutionCommand::Completed);
        assert_eq!(restored.control_outputs["completed"], json!(true));
    }
}
