use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProcessId;

/// Position of an entry within its stream.
///
/// Sequences start at 1 for the first entry; [`Sequence::initial`] (0) is the
/// position of a stream with no entries. Sequences keep growing across
/// checkpoints, so a compacted stream never reuses a position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    /// Creates a sequence from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the position of an empty stream.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next position.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// One recorded event of a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The process this entry belongs to.
    pub stream: ProcessId,

    /// The kind of process (e.g. "OrderSaga", "Fulfillment").
    pub stream_type: String,

    /// The type of the recorded event.
    pub event_type: String,

    /// Position of this entry in its stream.
    pub sequence: Sequence,

    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl JournalEntry {
    /// Records a serializable event at the given position.
    pub fn record<T: Serialize>(
        stream: ProcessId,
        stream_type: impl Into<String>,
        event_type: impl Into<String>,
        sequence: Sequence,
        event: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            stream,
            stream_type: stream_type.into(),
            event_type: event_type.into(),
            sequence,
            recorded_at: Utc::now(),
            payload: serde_json::to_value(event)?,
        })
    }

    /// Deserializes the payload back into a concrete event.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_ordering() {
        let s1 = Sequence::new(1);
        let s2 = Sequence::new(2);
        assert!(s1 < s2);
        assert_eq!(s1.next(), s2);
        assert_eq!(Sequence::initial().next(), s1);
    }

    #[test]
    fn entry_decodes_its_payload() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct PointsEarned {
            amount: u64,
        }

        let stream = ProcessId::new();
        let entry = JournalEntry::record(
            stream,
            "CustomerLedger",
            "PointsEarned",
            Sequence::new(1),
            &PointsEarned { amount: 3 },
        )
        .unwrap();

        assert_eq!(entry.stream, stream);
        assert_eq!(entry.event_type, "PointsEarned");
        assert_eq!(entry.decode::<PointsEarned>().unwrap(), PointsEarned { amount: 3 });
    }
}
