use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::journal::validate_batch;
use crate::{
    AppendOptions, Checkpoint, Journal, JournalEntry, JournalError, ProcessId, Result, Sequence,
};

#[derive(Debug, Default)]
struct StreamLog {
    head: Sequence,
    entries: Vec<JournalEntry>,
    checkpoint: Option<Checkpoint>,
}

/// In-memory journal.
///
/// Cloning is cheap and every clone shares the same streams, so one journal
/// can be handed to every process of an engine.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJournal {
    streams: Arc<RwLock<HashMap<ProcessId, StreamLog>>>,
}

impl InMemoryJournal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of streams that have ever been written.
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn append(&self, entries: Vec<JournalEntry>, options: AppendOptions) -> Result<Sequence> {
        validate_batch(&entries)?;

        let stream = entries[0].stream;
        let first_sequence = entries[0].sequence;

        let mut streams = self.streams.write().await;
        let log = streams.entry(stream).or_default();

        if let Some(expected) = options.expected_sequence
            && log.head != expected
        {
            return Err(JournalError::SequenceConflict {
                stream,
                expected,
                actual: log.head,
            });
        }

        if first_sequence != log.head.next() {
            return Err(JournalError::SequenceConflict {
                stream,
                expected: first_sequence,
                actual: log.head.next(),
            });
        }

        log.head = entries
            .last()
            .map(|entry| entry.sequence)
            .unwrap_or(log.head);
        log.entries.extend(entries);

        Ok(log.head)
    }

    async fn history(&self, stream: ProcessId) -> Result<Vec<JournalEntry>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&stream)
            .map(|log| log.entries.clone())
            .unwrap_or_default())
    }

    async fn history_len(&self, stream: ProcessId) -> Result<usize> {
        let streams = self.streams.read().await;
        Ok(streams.get(&stream).map_or(0, |log| log.entries.len()))
    }

    async fn head(&self, stream: ProcessId) -> Result<Sequence> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&stream)
            .map_or(Sequence::initial(), |log| log.head))
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut streams = self.streams.write().await;
        let log = streams.entry(checkpoint.stream).or_default();

        if checkpoint.sequence > log.head {
            return Err(JournalError::CheckpointAhead {
                stream: checkpoint.stream,
                sequence: checkpoint.sequence,
                head: log.head,
            });
        }

        let covered = checkpoint.sequence;
        let before = log.entries.len();
        log.entries.retain(|entry| entry.sequence > covered);
        tracing::debug!(
            stream = %checkpoint.stream,
            sequence = %covered,
            compacted = before - log.entries.len(),
            "checkpoint saved"
        );
        log.checkpoint = Some(checkpoint);

        Ok(())
    }

    async fn latest_checkpoint(&self, stream: ProcessId) -> Result<Option<Checkpoint>> {
        let streams = self.streams.read().await;
        Ok(streams.get(&stream).and_then(|log| log.checkpoint.clone()))
    }
}
