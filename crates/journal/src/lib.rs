//! Process history for the fulfillment engine.
//!
//! Every logical process (order saga, fulfillment sub-process, customer
//! ledger) records the events it applies as an ordered stream of
//! [`JournalEntry`] values. Streams are bounded by [`Checkpoint`]s: saving a
//! checkpoint compacts the history it covers, which is how long-running
//! processes continue as a fresh instance without unbounded history.

pub mod checkpoint;
pub mod entry;
pub mod error;
pub mod journal;
pub mod memory;

pub use checkpoint::Checkpoint;
pub use common::ProcessId;
pub use entry::{JournalEntry, Sequence};
pub use error::{JournalError, Result};
pub use journal::{AppendOptions, Journal};
pub use memory::InMemoryJournal;
