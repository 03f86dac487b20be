//! Order requests and their partitioning by department.

mod category;
mod request;

pub use category::{Category, ParseCategoryError};
pub use request::{LineItem, OrderRequest};

use thiserror::Error;

/// Identifier of an order; the order saga's process ID.
pub type OrderId = common::ProcessId;

/// Errors that make an order request unacceptable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderRequestError {
    /// The order has no line items.
    #[error("Order has no items")]
    NoItems,

    /// A line item has a zero quantity.
    #[error("Invalid quantity for {name}: {quantity} (must be at least 1)")]
    InvalidQuantity { name: String, quantity: u32 },

    /// A line item has a blank display name.
    #[error("Line item {index} has no name")]
    MissingName { index: usize },
}
