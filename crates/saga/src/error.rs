//! Error types of the engine's processes and boundary.

use std::time::Duration;

use common::CustomerId;
use domain::{Category, FulfillmentError, OrderId, OrderRequestError};
use journal::JournalError;
use thiserror::Error;

use crate::services::PaymentError;

/// Reasons a fulfillment sub-process ends other than closing normally.
#[derive(Debug, Error)]
pub enum FulfillmentProcessError {
    /// A line was marked failed; the whole fulfillment failed with it.
    #[error("Line {line} ({name}) could not be fulfilled")]
    ItemFailed { line: u32, name: String },

    /// The owning saga could not be told that fulfillment started.
    #[error("Owning order saga is unreachable")]
    ParentUnreachable,

    /// Process history could not be recorded.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),
}

/// Terminal errors of an order saga.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The charge was rejected; nothing was spawned and nothing is refunded.
    #[error("Payment failed: {0}")]
    PaymentFailed(#[source] PaymentError),

    /// A unit line was marked failed by staff.
    #[error("Fulfillment failed for {category} line {line} ({name})")]
    ItemFulfillmentFailed {
        category: Category,
        line: u32,
        name: String,
    },

    /// Fulfillment started but did not finish within the window.
    #[error("Order not fulfilled within {window:?}")]
    FulfillmentDeadlineExceeded { window: Duration },

    /// The saga was canceled from outside.
    #[error("Order canceled")]
    OrderCanceled,

    /// A fulfillment sub-process ended abnormally.
    #[error("Fulfillment of {category} aborted: {reason}")]
    FulfillmentAborted { category: Category, reason: String },

    /// Saga history could not be recorded.
    #[error("Journal error: {0}")]
    Journal(String),

    /// The saga task itself died.
    #[error("Order saga aborted: {0}")]
    Aborted(String),
}

impl OrderError {
    /// Returns a short, stable name used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::PaymentFailed(_) => "payment_failed",
            OrderError::ItemFulfillmentFailed { .. } => "item_failed",
            OrderError::FulfillmentDeadlineExceeded { .. } => "deadline_exceeded",
            OrderError::OrderCanceled => "canceled",
            OrderError::FulfillmentAborted { .. } => "fulfillment_aborted",
            OrderError::Journal(_) => "journal",
            OrderError::Aborted(_) => "aborted",
        }
    }
}

impl From<JournalError> for OrderError {
    fn from(error: JournalError) -> Self {
        OrderError::Journal(error.to_string())
    }
}

/// Errors of the customer ledger registry.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger process stopped before it could take the event.
    #[error("Ledger for {0} is not running")]
    Unavailable(CustomerId),

    /// Ledger history could not be read or written.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),
}

/// Errors returned to callers of the [`Cafe`](crate::Cafe) boundary.
#[derive(Debug, Error)]
pub enum CafeError {
    /// The order request was rejected before a saga was started.
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] OrderRequestError),

    /// No order with this ID was started here.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order has no fulfillment for this category (yet).
    #[error("No {category} fulfillment for order {order_id}")]
    FulfillmentNotFound { category: Category, order_id: OrderId },

    /// The fulfillment rejected an item status update.
    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),

    /// A loyalty ledger could not be reached.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Process history could not be read.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_error_messages() {
        let error = OrderError::ItemFulfillmentFailed {
            category: Category::Food,
            line: 1,
            name: "Bagel".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Fulfillment failed for food line 1 (Bagel)"
        );
        assert_eq!(error.kind(), "item_failed");

        let declined = OrderError::PaymentFailed(PaymentError::Declined("insufficient funds".into()));
        assert_eq!(
            declined.to_string(),
            "Payment failed: Payment declined: insufficient funds"
        );
    }

    #[test]
    fn test_journal_errors_convert() {
        let error: OrderError = JournalError::InvalidAppend("empty".to_string()).into();
        assert!(matches!(error, OrderError::Journal(ref reason) if reason.contains("empty")));
    }
}
