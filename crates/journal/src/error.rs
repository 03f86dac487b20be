use thiserror::Error;

use crate::{ProcessId, Sequence};

/// Errors that can occur when reading or writing process history.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The stream was not at the expected sequence when appending.
    #[error(
        "Sequence conflict for stream {stream}: expected sequence {expected}, found {actual}"
    )]
    SequenceConflict {
        stream: ProcessId,
        expected: Sequence,
        actual: Sequence,
    },

    /// The entries passed to an append were not a valid batch.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A checkpoint referenced history that was never recorded.
    #[error("Checkpoint for stream {stream} is ahead of its history ({sequence} > {head})")]
    CheckpointAhead {
        stream: ProcessId,
        sequence: Sequence,
        head: Sequence,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;
