//! Per-department fulfillment state machine.
//!
//! One [`Fulfillment`] tracks the unit lines of a single category of a single
//! order. It is generic over [`Category`](crate::Category): the kitchen and
//! the barista run the same machine.

mod aggregate;
mod events;
mod status;

pub use aggregate::Fulfillment;
pub use events::{Closure, FulfillmentEvent};
pub use status::{FulfillmentLine, FulfillmentStatus, ItemStatusUpdate, LineStatus, ParseStatusError};

use thiserror::Error;

/// Reasons an item status update is rejected.
///
/// A rejected update leaves the fulfillment untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    /// The line index is outside `1..=line_count`.
    #[error("Invalid line item: {line} (expected 1..={line_count})")]
    InvalidLine { line: u32, line_count: u32 },

    /// The line cannot move from its current status to the requested one.
    #[error("Invalid status transition for line {line}: {from} -> {to}")]
    InvalidTransition {
        line: u32,
        from: LineStatus,
        to: LineStatus,
    },

    /// The fulfillment is closed and accepts no further updates.
    #[error("Fulfillment is closed")]
    Closed,
}
