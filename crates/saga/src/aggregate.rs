//! Order saga progress, folded from its history.

use std::collections::BTreeSet;

use domain::{Aggregate, Category, CustomerId, OrderId};
use journal::JournalEntry;
use serde::{Deserialize, Serialize};

use crate::events::SagaEvent;
use crate::services::PaymentReceipt;
use crate::state::SagaState;

/// Result of the compensating refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundOutcome {
    Issued,
    Failed(String),
}

/// Progress of one order saga.
///
/// The saga never reads this back while running; it exists so an order's
/// progress can be answered from the journal at any time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaInstance {
    order_id: Option<OrderId>,
    customer: Option<CustomerId>,
    units: u64,
    state: SagaState,
    receipt: Option<PaymentReceipt>,
    outstanding: BTreeSet<Category>,
    started: BTreeSet<Category>,
    deadline_armed: bool,
    failure_reason: Option<String>,
    refund: Option<RefundOutcome>,
}

impl Aggregate for SagaInstance {
    type Event = SagaEvent;

    fn aggregate_type() -> &'static str {
        "OrderSaga"
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            SagaEvent::OrderAccepted(data) => {
                self.order_id = Some(data.order_id);
                self.customer = data.customer;
                self.units = data.units;
                self.state = SagaState::Charging;
            }
            SagaEvent::PaymentCharged(receipt) => {
                self.receipt = Some(receipt);
                self.state = SagaState::Fulfilling;
            }
            SagaEvent::PaymentFailed(data) => {
                self.failure_reason = Some(data.reason);
            }
            SagaEvent::FulfillmentSpawned(data) => {
                self.outstanding.insert(data.category);
            }
            SagaEvent::FulfillmentStarted(data) => {
                self.started.insert(data.category);
            }
            SagaEvent::DeadlineArmed(_) => {
                self.deadline_armed = true;
            }
            SagaEvent::FulfillmentClosed(data) => {
                self.outstanding.remove(&data.category);
            }
            SagaEvent::CompensationStarted(data) => {
                self.state = SagaState::Compensating;
                self.failure_reason = Some(data.reason);
            }
            SagaEvent::RefundIssued(_) => {
                self.refund = Some(RefundOutcome::Issued);
            }
            SagaEvent::RefundFailed(data) => {
                self.refund = Some(RefundOutcome::Failed(data.reason));
            }
            SagaEvent::OrderCompleted(_) => {
                self.state = SagaState::Completed;
            }
            SagaEvent::OrderFailed(data) => {
                self.state = SagaState::Failed;
                self.failure_reason = Some(data.reason);
            }
        }
    }
}

impl SagaInstance {
    /// Folds a recorded saga history.
    ///
    /// Returns None for an empty history.
    pub fn from_history(entries: &[JournalEntry]) -> Result<Option<Self>, serde_json::Error> {
        if entries.is_empty() {
            return Ok(None);
        }

        let mut saga = Self::default();
        for entry in entries {
            saga.apply(entry.decode::<SagaEvent>()?);
        }
        Ok(Some(saga))
    }
}

// Query methods
impl SagaInstance {
    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn customer(&self) -> Option<&CustomerId> {
        self.customer.as_ref()
    }

    /// Returns the total unit count of the order.
    pub fn units(&self) -> u64 {
        self.units
    }

    pub fn receipt(&self) -> Option<&PaymentReceipt> {
        self.receipt.as_ref()
    }

    /// Returns the categories whose fulfillment has not closed, in order.
    pub fn outstanding(&self) -> impl Iterator<Item = Category> + '_ {
        self.outstanding.iter().copied()
    }

    /// Returns true if staff started on the given category.
    pub fn has_started(&self, category: Category) -> bool {
        self.started.contains(&category)
    }

    pub fn deadline_armed(&self) -> bool {
        self.deadline_armed
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn refund(&self) -> Option<&RefundOutcome> {
        self.refund.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use domain::{LineItem, OrderRequest, ProcessId};

    use super::*;

    fn receipt() -> PaymentReceipt {
        PaymentReceipt {
            auth_code: "AUTH-0001".to_string(),
        }
    }

    fn accepted(order_id: OrderId) -> SagaEvent {
        let request = OrderRequest::new(
            "tok_visa",
            vec![LineItem::beverage("Latte", 1), LineItem::food("Bagel", 2)],
        );
        SagaEvent::order_accepted(order_id, &request)
    }

    #[test]
    fn test_default_saga_instance() {
        let saga = SagaInstance::default();
        assert!(saga.order_id().is_none());
        assert_eq!(saga.state(), SagaState::NotStarted);
        assert_eq!(saga.outstanding().count(), 0);
    }

    #[test]
    fn test_successful_order() {
        let order_id = OrderId::new();
        let mut saga = SagaInstance::default();

        saga.apply(accepted(order_id));
        assert_eq!(saga.state(), SagaState::Charging);
        assert_eq!(saga.units(), 3);

        saga.apply_events([
            SagaEvent::payment_charged(receipt()),
            SagaEvent::fulfillment_spawned(Category::Beverage, ProcessId::new(), 1),
            SagaEvent::fulfillment_spawned(Category::Food, ProcessId::new(), 2),
        ]);
        assert_eq!(saga.state(), SagaState::Fulfilling);
        assert_eq!(
            saga.outstanding().collect::<Vec<_>>(),
            vec![Category::Beverage, Category::Food]
        );

        saga.apply_events([
            SagaEvent::fulfillment_started(Category::Food),
            SagaEvent::deadline_armed(Duration::from_secs(900)),
            SagaEvent::fulfillment_closed(Category::Beverage, None),
            SagaEvent::fulfillment_closed(Category::Food, None),
            SagaEvent::order_completed(3),
        ]);

        assert_eq!(saga.order_id(), Some(order_id));
        assert!(saga.has_started(Category::Food));
        assert!(!saga.has_started(Category::Beverage));
        assert!(saga.deadline_armed());
        assert_eq!(saga.outstanding().count(), 0);
        assert_eq!(saga.state(), SagaState::Completed);
        assert!(saga.refund().is_none());
    }

    #[test]
    fn test_compensated_order() {
        let mut saga = SagaInstance::default();
        saga.apply_events([
            accepted(OrderId::new()),
            SagaEvent::payment_charged(receipt()),
            SagaEvent::fulfillment_spawned(Category::Food, ProcessId::new(), 2),
            SagaEvent::fulfillment_closed(Category::Food, Some("line 1 failed".into())),
            SagaEvent::compensation_started("line 1 failed"),
        ]);
        assert_eq!(saga.state(), SagaState::Compensating);

        saga.apply_events([
            SagaEvent::refund_failed("refund rejected"),
            SagaEvent::order_failed("line 1 failed"),
        ]);
        assert_eq!(saga.state(), SagaState::Failed);
        assert_eq!(saga.failure_reason(), Some("line 1 failed"));
        assert_eq!(
            saga.refund(),
            Some(&RefundOutcome::Failed("refund rejected".to_string()))
        );
        assert_eq!(saga.receipt(), Some(&receipt()));
    }

    #[test]
    fn test_payment_failure_never_holds_payment() {
        let mut saga = SagaInstance::default();
        saga.apply_events([
            accepted(OrderId::new()),
            SagaEvent::payment_failed("card declined"),
            SagaEvent::order_failed("card declined"),
        ]);

        assert_eq!(saga.state(), SagaState::Failed);
        assert!(saga.receipt().is_none());
        assert!(saga.refund().is_none());
    }

    #[test]
    fn test_from_history() {
        let stream = ProcessId::new();
        let events = [accepted(OrderId::new()), SagaEvent::payment_charged(receipt())];
        let entries: Vec<JournalEntry> = events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                JournalEntry::record(
                    stream,
                    SagaInstance::aggregate_type(),
                    domain::DomainEvent::event_type(event),
                    journal::Sequence::new(i as u64 + 1),
                    event,
                )
                .unwrap()
            })
            .collect();

        let saga = SagaInstance::from_history(&entries).unwrap().unwrap();
        assert_eq!(saga.state(), SagaState::Fulfilling);
        assert!(SagaInstance::from_history(&[]).unwrap().is_none());
    }
}
