use std::sync::Arc;

use domain::DomainEvent;
use journal::{AppendOptions, Journal, JournalEntry, ProcessId, Sequence};

/// Appends the events of one process to its journal stream.
///
/// A process is the only writer of its stream, so the recorder tracks the
/// head itself and appends with an expected sequence.
pub(crate) struct Recorder<J> {
    journal: Arc<J>,
    stream: ProcessId,
    stream_type: &'static str,
    head: Sequence,
}

impl<J: Journal> Recorder<J> {
    /// Creates a recorder for a stream with no history.
    pub(crate) fn new(journal: Arc<J>, stream: ProcessId, stream_type: &'static str) -> Self {
        Self::resume(journal, stream, stream_type, Sequence::initial())
    }

    /// Creates a recorder that continues a stream at `head`.
    pub(crate) fn resume(
        journal: Arc<J>,
        stream: ProcessId,
        stream_type: &'static str,
        head: Sequence,
    ) -> Self {
        Self {
            journal,
            stream,
            stream_type,
            head,
        }
    }

    pub(crate) fn stream(&self) -> ProcessId {
        self.stream
    }

    pub(crate) fn head(&self) -> Sequence {
        self.head
    }

    /// Records events as one atomic batch and returns the new head.
    ///
    /// The head only moves when the append succeeds.
    pub(crate) async fn record<E: DomainEvent>(&mut self, events: &[E]) -> journal::Result<Sequence> {
        if events.is_empty() {
            return Ok(self.head);
        }

        let mut sequence = self.head;
        let mut entries = Vec::with_capacity(events.len());
        for event in events {
            sequence = sequence.next();
            entries.push(JournalEntry::record(
                self.stream,
                self.stream_type,
                event.event_type(),
                sequence,
                event,
            )?);
        }

        self.head = self
            .journal
            .append(entries, AppendOptions::expect_sequence(self.head))
            .await?;
        Ok(self.head)
    }

    /// Returns the number of entries retained in the stream.
    pub(crate) async fn history_len(&self) -> journal::Result<usize> {
        self.journal.history_len(self.stream).await
    }

    pub(crate) fn journal(&self) -> &Arc<J> {
        &self.journal
    }
}

#[cfg(test)]
mod tests {
    use domain::{Aggregate, LedgerEvent, LoyaltyAccount};
    use journal::InMemoryJournal;

    use super::*;

    #[tokio::test]
    async fn test_records_contiguous_batches() {
        let journal = Arc::new(InMemoryJournal::new());
        let stream = ProcessId::new();
        let mut recorder = Recorder::new(journal.clone(), stream, LoyaltyAccount::aggregate_type());

        let head = recorder
            .record(&[
                LedgerEvent::PointsEarned { amount: 1 },
                LedgerEvent::PointsEarned { amount: 3 },
            ])
            .await
            .unwrap();
        assert_eq!(head, Sequence::new(2));

        recorder
            .record(&[LedgerEvent::PointsEarned { amount: 1 }])
            .await
            .unwrap();

        let history = journal.history(stream).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].sequence, Sequence::new(3));
        assert_eq!(history[2].event_type, "PointsEarned");
        assert_eq!(history[0].stream_type, "CustomerLedger");
        assert_eq!(recorder.history_len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_written() {
        let journal = Arc::new(InMemoryJournal::new());
        let mut recorder = Recorder::new(journal.clone(), ProcessId::new(), "Test");

        let head = recorder.record::<LedgerEvent>(&[]).await.unwrap();
        assert_eq!(head, Sequence::initial());
        assert_eq!(journal.stream_count().await, 0);
    }

    #[tokio::test]
    async fn test_second_writer_conflicts() {
        let journal = Arc::new(InMemoryJournal::new());
        let stream = ProcessId::new();
        let mut first = Recorder::new(journal.clone(), stream, "Test");
        let mut second = Recorder::new(journal.clone(), stream, "Test");

        first
            .record(&[LedgerEvent::PointsEarned { amount: 1 }])
            .await
            .unwrap();
        let result = second
            .record(&[LedgerEvent::PointsEarned { amount: 2 }])
            .await;

        assert!(result.is_err());
        assert_eq!(second.head(), Sequence::initial());
    }
}
