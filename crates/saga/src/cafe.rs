//! The engine's boundary.

use std::collections::HashMap;
use std::sync::Arc;

use common::CustomerId;
use domain::{Category, FulfillmentStatus, ItemStatusUpdate, OrderId, OrderRequest};
use journal::{Journal, JournalError};
use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;

use crate::aggregate::SagaInstance;
use crate::config::EngineConfig;
use crate::coordinator::{OrderSaga, OrderSummary, SagaContext};
use crate::error::{CafeError, OrderError};
use crate::services::PaymentService;

type OrderOutcome = Result<OrderSummary, OrderError>;

struct OrderEntry {
    cancel: CancellationToken,
    outcome: watch::Receiver<Option<OrderOutcome>>,
}

/// Handle to a started order.
#[derive(Debug, Clone)]
pub struct OrderHandle {
    order_id: OrderId,
    outcome: watch::Receiver<Option<OrderOutcome>>,
}

impl OrderHandle {
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// Returns true once the saga reached its terminal outcome.
    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Waits for the saga's terminal outcome.
    pub async fn outcome(&self) -> OrderOutcome {
        let mut outcome = self.outcome.clone();
        match outcome.wait_for(Option::is_some).await {
            Ok(finished) => finished
                .clone()
                .unwrap_or_else(|| Err(OrderError::Aborted("outcome missing".to_string()))),
            Err(_) => Err(OrderError::Aborted("saga dropped".to_string())),
        }
    }
}

/// The cafe: starts orders and routes staff and customer requests to the
/// processes that own them.
///
/// Every operation is safe to call concurrently from many tasks.
pub struct Cafe<J, P> {
    context: SagaContext<J, P>,
    orders: Arc<RwLock<HashMap<OrderId, OrderEntry>>>,
}

impl<J, P> Clone for Cafe<J, P> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            orders: Arc::clone(&self.orders),
        }
    }
}

impl<J, P> Cafe<J, P>
where
    J: Journal + 'static,
    P: PaymentService + 'static,
{
    pub fn new(journal: J, payment: P, config: EngineConfig) -> Self {
        Self::with_shared(Arc::new(journal), Arc::new(payment), config)
    }

    /// Creates a cafe over collaborators the caller keeps a handle to.
    pub fn with_shared(journal: Arc<J>, payment: Arc<P>, config: EngineConfig) -> Self {
        Self {
            context: SagaContext::new(journal, payment, config),
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validates an order and starts its saga.
    ///
    /// Returns as soon as the saga is running; use the handle to wait for the
    /// outcome.
    #[tracing::instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn start_order(&self, request: OrderRequest) -> Result<OrderHandle, CafeError> {
        request.validate()?;

        let order_id = OrderId::new();
        let cancel = CancellationToken::new();
        let (outcome_tx, outcome_rx) = watch::channel(None);

        self.orders.write().await.insert(
            order_id,
            OrderEntry {
                cancel: cancel.clone(),
                outcome: outcome_rx.clone(),
            },
        );

        let saga = OrderSaga::new(order_id, request, self.context.clone());
        let running = tokio::spawn(saga.run(cancel));
        let orders = Arc::clone(&self.orders);
        let directory = self.context.directory.clone();
        let retention = self.context.config.finished_retention;
        tokio::spawn(async move {
            let outcome = running
                .await
                .unwrap_or_else(|error| Err(OrderError::Aborted(error.to_string())));
            outcome_tx.send_replace(Some(outcome));

            // Handles already given out keep working; lookups stop after this.
            tokio::time::sleep(retention).await;
            orders.write().await.remove(&order_id);
            directory.forget(order_id).await;
            tracing::debug!(%order_id, "finished order forgotten");
        });

        tracing::info!(%order_id, "order started");

        Ok(OrderHandle {
            order_id,
            outcome: outcome_rx,
        })
    }

    /// Returns the handle of a started order.
    ///
    /// Finished orders are forgotten once `finished_retention` has passed;
    /// their journaled progress stays available through `order_progress`.
    pub async fn order(&self, order_id: OrderId) -> Option<OrderHandle> {
        self.orders
            .read()
            .await
            .get(&order_id)
            .map(|entry| OrderHandle {
                order_id,
                outcome: entry.outcome.clone(),
            })
    }

    /// Returns the status of one category of an order.
    pub async fn query_order_status(
        &self,
        order_id: OrderId,
        category: Category,
    ) -> Result<FulfillmentStatus, CafeError> {
        let client = self
            .context
            .directory
            .get(order_id, category)
            .await
            .ok_or(CafeError::FulfillmentNotFound { category, order_id })?;
        Ok(client.status())
    }

    /// Applies a staff update to one line of an order's fulfillment.
    #[tracing::instrument(skip(self))]
    pub async fn send_item_status_update(
        &self,
        order_id: OrderId,
        category: Category,
        update: ItemStatusUpdate,
    ) -> Result<(), CafeError> {
        let client = self
            .context
            .directory
            .get(order_id, category)
            .await
            .ok_or(CafeError::FulfillmentNotFound { category, order_id })?;
        client.update_item(update).await?;
        Ok(())
    }

    /// Returns a customer's loyalty balance, or None if they never earned any.
    pub async fn query_loyalty_balance(
        &self,
        customer: &CustomerId,
    ) -> Result<Option<u64>, CafeError> {
        Ok(self.context.ledgers.balance(customer).await?)
    }

    /// Credits loyalty points outside of an order.
    pub async fn credit_loyalty_points(
        &self,
        customer: CustomerId,
        amount: u64,
    ) -> Result<(), CafeError> {
        self.context.ledgers.credit(customer, amount).await?;
        Ok(())
    }

    /// Cancels a running order. The saga refunds the charge if it holds one.
    ///
    /// Canceling a finished order has no effect; a forgotten one is not found.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<(), CafeError> {
        let orders = self.orders.read().await;
        let entry = orders
            .get(&order_id)
            .ok_or(CafeError::OrderNotFound(order_id))?;
        entry.cancel.cancel();
        Ok(())
    }

    /// Returns the open fulfillments of a category, ordered by order ID.
    pub async fn open_fulfillments(&self, category: Category) -> Vec<(OrderId, FulfillmentStatus)> {
        self.context.directory.open_for(category).await
    }

    /// Folds an order's recorded history into its current progress.
    pub async fn order_progress(&self, order_id: OrderId) -> Result<Option<SagaInstance>, CafeError> {
        let history = self.context.journal.history(order_id).await?;
        Ok(SagaInstance::from_history(&history).map_err(JournalError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use domain::LineItem;
    use journal::InMemoryJournal;

    use super::*;
    use crate::services::InMemoryPaymentService;

    fn cafe() -> Cafe<InMemoryJournal, InMemoryPaymentService> {
        Cafe::new(
            InMemoryJournal::new(),
            InMemoryPaymentService::new(),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_rejects_invalid_order() {
        let cafe = cafe();
        let result = cafe.start_order(OrderRequest::new("tok_visa", vec![])).await;
        assert!(matches!(result, Err(CafeError::InvalidOrder(_))));

        let result = cafe
            .start_order(OrderRequest::new("tok_visa", vec![LineItem::food("Bagel", 0)]))
            .await;
        assert!(matches!(result, Err(CafeError::InvalidOrder(_))));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let cafe = cafe();
        let order_id = OrderId::new();

        assert!(matches!(
            cafe.cancel_order(order_id).await,
            Err(CafeError::OrderNotFound(id)) if id == order_id
        ));
        assert!(matches!(
            cafe.query_order_status(order_id, Category::Food).await,
            Err(CafeError::FulfillmentNotFound { .. })
        ));
        assert!(cafe.order(order_id).await.is_none());
        assert!(cafe.order_progress(order_id).await.unwrap().is_none());
    }
}
