//! Core state-machine and domain event traits.

use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// Used as the entry type when the event is journaled.
    fn event_type(&self) -> &'static str;
}

/// Trait for event-sourced state owned by a single logical process.
///
/// Commands are methods taking `&self` that either reject or return the
/// events describing the change; only [`Aggregate::apply`] mutates. This keeps
/// rejection free of partial mutation and makes replaying a recorded history
/// reproduce the same state.
pub trait Aggregate: Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name, used as the journal stream type.
    fn aggregate_type() -> &'static str;

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic and must not fail.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Trait for aggregates of indefinitely-running processes.
///
/// Such a process periodically exports a minimal [`Checkpointable::Checkpoint`]
/// and hands control to a fresh instance rebuilt from it with
/// [`Checkpointable::resume`].
pub trait Checkpointable: Aggregate {
    /// The exported continuation state.
    type Checkpoint: Serialize + DeserializeOwned + Send + Sync + Clone;

    /// Exports the state carried forward into the next instance.
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Rebuilds an instance from an exported checkpoint.
    fn resume(checkpoint: Self::Checkpoint) -> Self;
}
