//! Failure modes of checkpoint persistence and resume admission
//!
//! Three sources feed this enum: storage backends report persistence
//! failures (`Store`, `Io`), the serializer reports wire-format failures
//! (`Encode`, `Decode`), and the executor reports an admission failure
//! when a resume is applied against the wrong graph (`RootMismatch`).
//! Per-node snapshot-shape violations are detected on the engine side,
//! where the port being restored is known.

use thiserror::Error;

/// Convenience alias used across the store and serializer surfaces.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Failure modes of checkpoint persistence and resume admission.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// A resume named an entry node that is not the root the checkpoint
    /// was taken under. Continuing would re-run the wrong graph region.
    #[error("Checkpoint belongs to a run rooted at '{checkpoint_root}', not '{requested_root}'")]
    RootMismatch {
        /// Entry node the caller asked to resume from.
        requested_root: String,
        /// Root recorded in the checkpoint.
        checkpoint_root: String,
    },

    /// A checkpoint could not be encoded for persistence.
    #[error("Checkpoint encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored bytes could not be decoded into a checkpoint.
    #[error("Checkpoint decoding failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// A storage backend operation failed.
    #[error("Checkpoint store {operation} failed: {message}")]
    Store {
        /// Operation that failed (`put`, `get`, `list`, ...).
        operation: String,
        /// Backend-specific description.
        message: String,
    },

    /// I/O failure in a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckpointError {
    /// Create a store error with operation context.
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rendering() {
        let err = CheckpointError::RootMismatch {
            requested_root: "counter".into(),
            checkpoint_root: "loop".into(),
        };
        assert_eq!(
            err.to_string(),
            "Checkpoint belongs to a run rooted at 'loop', not 'counter'"
        );

        let err = CheckpointError::store("put", "disk full");
        assert_eq!(err.to_string(), "Checkpoint store put failed: disk full");
    }

    #[test]
    fn test_decode_keeps_source() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = CheckpointError::Decode(parse_err);
        assert!(err.to_string().starts_with("Checkpoint decoding failed"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
