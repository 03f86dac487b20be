use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ProcessId, Sequence};

/// Exported state of a process at a specific position in its history.
///
/// A checkpoint is the continuation seed of a long-running process: a fresh
/// instance is constructed from `state` and only history recorded after
/// `sequence` needs to be replayed on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The process this checkpoint belongs to.
    pub stream: ProcessId,

    /// The kind of process.
    pub stream_type: String,

    /// The last history position covered by `state`.
    pub sequence: Sequence,

    /// When the checkpoint was taken.
    pub taken_at: DateTime<Utc>,

    /// The serialized process state.
    pub state: serde_json::Value,
}

impl Checkpoint {
    /// Creates a checkpoint from a serializable state.
    pub fn from_state<T: Serialize>(
        stream: ProcessId,
        stream_type: impl Into<String>,
        sequence: Sequence,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            stream,
            stream_type: stream_type.into(),
            sequence,
            taken_at: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    /// Deserializes the checkpoint state into a concrete type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}
