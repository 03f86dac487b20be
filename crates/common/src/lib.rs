//! Identifiers shared by every crate of the fulfillment engine.

mod types;

pub use types::{CustomerId, ProcessId};
