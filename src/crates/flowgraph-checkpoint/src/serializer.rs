//! Checkpoint encoding protocol
//!
//! Backends that persist checkpoints as bytes (files, blobs, databases) go
//! through [`CheckpointSerializer`] so the encoding is swappable without
//! touching the store logic. JSON is the canonical format: every field of an
//! [`ExecutionCheckpoint`] is JSON-serializable by construction, and the
//! deferred stack ordering survives the round-trip.

use crate::checkpoint::ExecutionCheckpoint;
use crate::error::{CheckpointError, Result};

/// Encode/decode protocol for checkpoint persistence.
pub trait CheckpointSerializer: Send + Sync {
    /// Serialize a checkpoint to bytes.
    fn dumps(&self, checkpoint: &ExecutionCheckpoint) -> Result<Vec<u8>>;

    /// Deserialize a checkpoint from bytes.
    fn loads(&self, data: &[u8]) -> Result<ExecutionCheckpoint>;
}

/// JSON serializer, compact by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact JSON.
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Human-readable JSON, for debugging dumps.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl CheckpointSerializer for JsonSerializer {
    fn dumps(&self, checkpoint: &ExecutionCheckpoint) -> Result<Vec<u8>> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(checkpoint)
        } else {
            serde_json::to_vec(checkpoint)
        };
        encoded.map_err(CheckpointError::Encode)
    }

    fn loads(&self, data: &[u8]) -> Result<ExecutionCheckpoint> {
        serde_json::from_slice(data).map_err(CheckpointError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_json_round_trip() {
        let mut pending = BTreeMap::new();
        pending.insert("c".to_string(), vec!["a".to_string(), "b".to_string()]);
        let cp = ExecutionCheckpoint::new("run-1", "c")
            .with_ready(vec!["a".to_string()])
            .with_deferred(vec!["outer".to_string(), "inner".to_string()])
            .with_pending(pending)
            .with_step(5);

        let serializer = JsonSerializer::new();
        let bytes = serializer.dumps(&cp).unwrap();
        let restored = serializer.loads(&bytes).unwrap();

        assert_eq!(restored.run_id, cp.run_id);
        assert_eq!(restored.step, 5);
        assert_eq!(restored.deferred, cp.deferred);
        assert_eq!(restored.pending, cp.pending);
    }

    #[test]
    fn test_pretty_output_is_readable() {
        let cp = ExecutionCheckpoint::new("run-1", "entry");
        let bytes = JsonSerializer::pretty().dumps(&cp).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains('\n'));

        let restored = JsonSerializer::new().loads(text.as_bytes()).unwrap();
        assert_eq!(restored.root_node_id, "entry");
    }

    #[test]
    fn test_loads_rejects_garbage() {
        let serializer = JsonSerializer::new();
        let err = serializer.loads(b"not json").unwrap_err();
        assert!(matches!(err, CheckpointError::Decode(_)));
    }
}
