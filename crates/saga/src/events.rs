//! Order saga history events.

use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::{Category, CustomerId, DomainEvent, OrderId, OrderRequest, ProcessId};
use serde::{Deserialize, Serialize};

use crate::services::PaymentReceipt;

/// Events recorded by an order saga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// The order was accepted for fulfillment.
    OrderAccepted(OrderAcceptedData),

    /// Payment was charged.
    PaymentCharged(PaymentReceipt),

    /// Payment was rejected; the order fails without compensation.
    PaymentFailed(FailureData),

    /// A fulfillment sub-process was spawned for a category.
    FulfillmentSpawned(FulfillmentSpawnedData),

    /// A fulfillment reported that staff started on it.
    FulfillmentStarted(CategoryData),

    /// The fulfillment deadline was armed.
    DeadlineArmed(DeadlineData),

    /// A fulfillment sub-process ended.
    FulfillmentClosed(FulfillmentClosedData),

    /// A terminal error occurred and compensation began.
    CompensationStarted(FailureData),

    /// The charge was refunded.
    RefundIssued(PaymentReceipt),

    /// The refund failed (the order still fails with its original error).
    RefundFailed(FailureData),

    /// Every fulfillment closed successfully.
    OrderCompleted(OrderCompletedData),

    /// The order ended with a terminal error.
    OrderFailed(OrderFailedData),
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::OrderAccepted(_) => "OrderAccepted",
            SagaEvent::PaymentCharged(_) => "PaymentCharged",
            SagaEvent::PaymentFailed(_) => "PaymentFailed",
            SagaEvent::FulfillmentSpawned(_) => "FulfillmentSpawned",
            SagaEvent::FulfillmentStarted(_) => "FulfillmentStarted",
            SagaEvent::DeadlineArmed(_) => "DeadlineArmed",
            SagaEvent::FulfillmentClosed(_) => "FulfillmentClosed",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::RefundIssued(_) => "RefundIssued",
            SagaEvent::RefundFailed(_) => "RefundFailed",
            SagaEvent::OrderCompleted(_) => "OrderCompleted",
            SagaEvent::OrderFailed(_) => "OrderFailed",
        }
    }
}

/// Data for OrderAccepted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAcceptedData {
    pub order_id: OrderId,
    pub customer: Option<CustomerId>,
    /// Categories to fulfill, in fan-out order.
    pub categories: Vec<Category>,
    /// Total unit count across all line items.
    pub units: u64,
    pub accepted_at: DateTime<Utc>,
}

/// Data for events that only carry a reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureData {
    pub reason: String,
}

/// Data for FulfillmentSpawned event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentSpawnedData {
    pub category: Category,
    pub process_id: ProcessId,
    pub lines: u32,
}

/// Data for events about one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    pub category: Category,
}

/// Data for DeadlineArmed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineData {
    pub window_secs: u64,
    pub armed_at: DateTime<Utc>,
}

/// Data for FulfillmentClosed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentClosedData {
    pub category: Category,
    /// Why the fulfillment failed, if it did.
    pub failure: Option<String>,
}

/// Data for OrderCompleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompletedData {
    pub units: u64,
    pub completed_at: DateTime<Utc>,
}

/// Data for OrderFailed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    pub fn order_accepted(order_id: OrderId, request: &OrderRequest) -> Self {
        SagaEvent::OrderAccepted(OrderAcceptedData {
            order_id,
            customer: request.customer.clone(),
            categories: request.partition().into_keys().collect(),
            units: request.unit_count(),
            accepted_at: Utc::now(),
        })
    }

    pub fn payment_charged(receipt: PaymentReceipt) -> Self {
        SagaEvent::PaymentCharged(receipt)
    }

    pub fn payment_failed(reason: impl Into<String>) -> Self {
        SagaEvent::PaymentFailed(FailureData {
            reason: reason.into(),
        })
    }

    pub fn fulfillment_spawned(category: Category, process_id: ProcessId, lines: u32) -> Self {
        SagaEvent::FulfillmentSpawned(FulfillmentSpawnedData {
            category,
            process_id,
            lines,
        })
    }

    pub fn fulfillment_started(category: Category) -> Self {
        SagaEvent::FulfillmentStarted(CategoryData { category })
    }

    pub fn deadline_armed(window: Duration) -> Self {
        SagaEvent::DeadlineArmed(DeadlineData {
            window_secs: window.as_secs(),
            armed_at: Utc::now(),
        })
    }

    pub fn fulfillment_closed(category: Category, failure: Option<String>) -> Self {
        SagaEvent::FulfillmentClosed(FulfillmentClosedData { category, failure })
    }

    pub fn compensation_started(reason: impl Into<String>) -> Self {
        SagaEvent::CompensationStarted(FailureData {
            reason: reason.into(),
        })
    }

    pub fn refund_issued(receipt: PaymentReceipt) -> Self {
        SagaEvent::RefundIssued(receipt)
    }

    pub fn refund_failed(reason: impl Into<String>) -> Self {
        SagaEvent::RefundFailed(FailureData {
            reason: reason.into(),
        })
    }

    pub fn order_completed(units: u64) -> Self {
        SagaEvent::OrderCompleted(OrderCompletedData {
            units,
            completed_at: Utc::now(),
        })
    }

    pub fn order_failed(reason: impl Into<String>) -> Self {
        SagaEvent::OrderFailed(OrderFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}
