use async_trait::async_trait;

use crate::{Checkpoint, JournalEntry, JournalError, ProcessId, Result, Sequence};

/// Options for appending entries to a stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected head of the stream. If None, no check is performed.
    pub expected_sequence: Option<Sequence>,
}

impl AppendOptions {
    /// Creates options with no sequence check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the stream head to be at `sequence`.
    pub fn expect_sequence(sequence: Sequence) -> Self {
        Self {
            expected_sequence: Some(sequence),
        }
    }
}

/// History storage for logical processes.
///
/// Each process owns exactly one stream and is its only writer. A stream's
/// history only grows, except that saving a checkpoint discards the entries
/// the checkpoint covers.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Appends a batch of entries atomically and returns the new head.
    ///
    /// Fails with `SequenceConflict` if `options.expected_sequence` is set and
    /// does not match the current head.
    async fn append(&self, entries: Vec<JournalEntry>, options: AppendOptions) -> Result<Sequence>;

    /// Returns the retained history of a stream, oldest first.
    async fn history(&self, stream: ProcessId) -> Result<Vec<JournalEntry>>;

    /// Returns the number of retained entries in a stream.
    ///
    /// This is the size that checkpointing keeps bounded.
    async fn history_len(&self, stream: ProcessId) -> Result<usize>;

    /// Returns the head of a stream, or `Sequence::initial()` if it is empty.
    async fn head(&self, stream: ProcessId) -> Result<Sequence>;

    /// Saves a checkpoint and compacts the history it covers.
    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Returns the latest checkpoint of a stream, if any.
    async fn latest_checkpoint(&self, stream: ProcessId) -> Result<Option<Checkpoint>>;
}

/// Validates a batch before it is appended.
pub(crate) fn validate_batch(entries: &[JournalEntry]) -> Result<()> {
    let Some(first) = entries.first() else {
        return Err(JournalError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected = first.sequence;
    for entry in &entries[1..] {
        if entry.stream != first.stream {
            return Err(JournalError::InvalidAppend(
                "all entries must belong to the same stream".to_string(),
            ));
        }
        expected = expected.next();
        if entry.sequence != expected {
            return Err(JournalError::InvalidAppend(format!(
                "sequences must be contiguous: expected {}, got {}",
                expected, entry.sequence
            )));
        }
    }

    Ok(())
}
