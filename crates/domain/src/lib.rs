//! Domain layer of the cafe fulfillment engine.
//!
//! This crate holds the pure, synchronous state machines the async processes
//! are built around:
//! - [`OrderRequest`] validation and deterministic partitioning by [`Category`]
//! - the generic per-department [`Fulfillment`] state machine
//! - the customer [`LoyaltyAccount`] and its checkpoint

pub mod aggregate;
pub mod fulfillment;
pub mod ledger;
pub mod order;

pub use aggregate::{Aggregate, Checkpointable, DomainEvent};
pub use common::{CustomerId, ProcessId};
pub use fulfillment::{
    Closure, Fulfillment, FulfillmentError, FulfillmentEvent, FulfillmentLine, FulfillmentStatus,
    ItemStatusUpdate, LineStatus, ParseStatusError,
};
pub use ledger::{LedgerCheckpoint, LedgerEvent, LoyaltyAccount, STARTING_BALANCE};
pub use order::{Category, LineItem, OrderId, OrderRequest, OrderRequestError, ParseCategoryError};
