//! Order saga coordinator.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;

use domain::{Aggregate, Category, OrderId, OrderRequest};
use journal::Journal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;

use crate::activity;
use crate::aggregate::SagaInstance;
use crate::config::EngineConfig;
use crate::directory::FulfillmentDirectory;
use crate::error::{FulfillmentProcessError, OrderError};
use crate::events::SagaEvent;
use crate::fulfillment::{self, FulfillmentOutcome};
use crate::ledger::LoyaltyLedgers;
use crate::recorder::Recorder;
use crate::scope;
use crate::services::{PaymentError, PaymentReceipt, PaymentService};

/// Signals a saga receives from its fulfillment processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaSignal {
    /// Staff started on a category.
    FulfillmentStarted { category: Category },
}

/// Result of a successfully fulfilled order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    /// Total unit count; also the loyalty points earned.
    pub units: u64,
    /// Whether points were handed to the customer's ledger.
    pub loyalty_credited: bool,
}

/// Collaborators shared by every saga of an engine.
pub struct SagaContext<J, P> {
    pub journal: Arc<J>,
    pub payment: Arc<P>,
    pub directory: FulfillmentDirectory,
    pub ledgers: LoyaltyLedgers<J>,
    pub config: EngineConfig,
}

impl<J, P> Clone for SagaContext<J, P> {
    fn clone(&self) -> Self {
        Self {
            journal: Arc::clone(&self.journal),
            payment: Arc::clone(&self.payment),
            directory: self.directory.clone(),
            ledgers: self.ledgers.clone(),
            config: self.config.clone(),
        }
    }
}

impl<J: Journal + 'static, P> SagaContext<J, P> {
    /// Creates a context with an empty directory and ledger registry.
    pub fn new(journal: Arc<J>, payment: Arc<P>, config: EngineConfig) -> Self {
        let ledgers = LoyaltyLedgers::new(Arc::clone(&journal), config.ledger_checkpoint_after);
        Self {
            journal,
            payment,
            directory: FulfillmentDirectory::new(),
            ledgers,
            config,
        }
    }
}

/// Fulfillment processes a saga is still waiting for.
#[derive(Default)]
struct Outstanding {
    handles: BTreeMap<Category, JoinHandle<FulfillmentOutcome>>,
    cancels: BTreeMap<Category, CancellationToken>,
}

impl Outstanding {
    fn insert(
        &mut self,
        category: Category,
        handle: JoinHandle<FulfillmentOutcome>,
        cancel: CancellationToken,
    ) {
        self.handles.insert(category, handle);
        self.cancels.insert(category, cancel);
    }

    fn remove(&mut self, category: Category) {
        self.handles.remove(&category);
        self.cancels.remove(&category);
    }

    fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Asks every outstanding process to stop, without waiting for it.
    fn cancel_all(&self) {
        for (category, cancel) in &self.cancels {
            tracing::info!(%category, "canceling fulfillment");
            cancel.cancel();
        }
    }
}

/// Waits for the next process to end.
///
/// Handles are polled in category order, so when several processes have
/// ended the lowest category is always reported first. The caller must
/// remove the reported handle before waiting again.
fn next_closed<T>(
    handles: &mut BTreeMap<Category, JoinHandle<T>>,
) -> impl Future<Output = (Category, Result<T, JoinError>)> + '_ {
    std::future::poll_fn(move |cx| {
        for (category, handle) in handles.iter_mut() {
            if let Poll::Ready(result) = Pin::new(handle).poll(cx) {
                return Poll::Ready((*category, result));
            }
        }
        Poll::Pending
    })
}

/// Completes when the deadline fires; never completes while it is unarmed.
async fn expired(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn record_quietly<J: Journal>(recorder: &mut Recorder<J>, events: &[SagaEvent]) {
    if let Err(error) = recorder.record(events).await {
        tracing::error!(%error, "failed to record saga history");
    }
}

/// Drives one order from acceptance to its terminal outcome.
///
/// The saga charges payment, spawns one fulfillment process per category and
/// then waits, in a single loop, for whichever happens first: a process
/// ending, a process reporting that staff started, the deadline, or external
/// cancellation. The deadline is armed by the first start report only, so
/// time spent queued before anyone picks the order up does not count.
///
/// On a terminal error every outstanding process is canceled and the charge
/// is refunded in a detached scope.
pub struct OrderSaga<J, P> {
    order_id: OrderId,
    request: OrderRequest,
    context: SagaContext<J, P>,
}

impl<J, P> OrderSaga<J, P>
where
    J: Journal + 'static,
    P: PaymentService + 'static,
{
    /// Creates a saga for a validated order request.
    pub fn new(order_id: OrderId, request: OrderRequest, context: SagaContext<J, P>) -> Self {
        Self {
            order_id,
            request,
            context,
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// Runs the saga to completion.
    #[tracing::instrument(skip(self, cancel), fields(order_id = %self.order_id))]
    pub async fn run(self, cancel: CancellationToken) -> Result<OrderSummary, OrderError> {
        metrics::counter!("orders_started_total").increment(1);
        let started_at = Instant::now();
        let mut recorder = Recorder::new(
            Arc::clone(&self.context.journal),
            self.order_id,
            SagaInstance::aggregate_type(),
        );

        let result = self.execute(&mut recorder, &cancel).await;

        let duration = started_at.elapsed().as_secs_f64();
        metrics::histogram!("order_duration_seconds").record(duration);
        match &result {
            Ok(summary) => {
                metrics::counter!("orders_completed").increment(1);
                tracing::info!(units = summary.units, duration, "order completed");
            }
            Err(error) => {
                metrics::counter!("orders_failed", "reason" => error.kind()).increment(1);
                tracing::warn!(%error, duration, "order failed");
            }
        }
        result
    }

    async fn execute(
        &self,
        recorder: &mut Recorder<J>,
        cancel: &CancellationToken,
    ) -> Result<OrderSummary, OrderError> {
        recorder
            .record(&[SagaEvent::order_accepted(self.order_id, &self.request)])
            .await?;

        // 1. Charge; nothing to compensate if this fails
        let receipt = match self.charge().await {
            Ok(receipt) => receipt,
            Err(error) => {
                let reason = error.to_string();
                record_quietly(
                    recorder,
                    &[
                        SagaEvent::payment_failed(&reason),
                        SagaEvent::order_failed(&reason),
                    ],
                )
                .await;
                return Err(OrderError::PaymentFailed(error));
            }
        };
        tracing::info!(auth_code = %receipt.auth_code, "payment charged");

        // 2. Fan out and wait
        let mut outstanding = Outstanding::default();
        if let Err(error) = self
            .fulfill(recorder, &receipt, &mut outstanding, cancel)
            .await
        {
            // 3. Compensate
            outstanding.cancel_all();
            self.compensate(recorder, receipt, &error).await;
            record_quietly(recorder, &[SagaEvent::order_failed(error.to_string())]).await;
            return Err(error);
        }

        Ok(self.complete(recorder).await)
    }

    async fn charge(&self) -> Result<PaymentReceipt, PaymentError> {
        let payment = &self.context.payment;
        let token = self.request.payment_token.as_str();
        activity::execute("charge_payment", &self.context.config.activity, move || {
            payment.charge(token)
        })
        .await
    }

    async fn fulfill(
        &self,
        recorder: &mut Recorder<J>,
        receipt: &PaymentReceipt,
        outstanding: &mut Outstanding,
        cancel: &CancellationToken,
    ) -> Result<(), OrderError> {
        recorder
            .record(&[SagaEvent::payment_charged(receipt.clone())])
            .await?;

        let (signals_tx, mut signals) = mpsc::unbounded_channel();
        for (category, items) in self.request.partition() {
            // Not a child of `cancel`: the saga decides when its processes stop.
            let process_cancel = CancellationToken::new();
            let (client, handle) = fulfillment::spawn(
                Arc::clone(&self.context.journal),
                self.order_id,
                category,
                &items,
                signals_tx.clone(),
                process_cancel.clone(),
            );
            let process_id = client.process_id();
            let lines = client.status().lines.len() as u32;

            self.context.directory.register(client).await;
            outstanding.insert(category, handle, process_cancel);
            recorder
                .record(&[SagaEvent::fulfillment_spawned(category, process_id, lines)])
                .await?;
            tracing::info!(%category, %process_id, lines, "fulfillment spawned");
        }

        let window = self.context.config.fulfillment_window;
        let mut deadline: Option<Pin<Box<Sleep>>> = None;

        while !outstanding.is_empty() {
            tokio::select! {
                biased;

                // A process reports its start before it can close, so handling
                // reports first records every start ahead of that close.
                Some(signal) = signals.recv() => match signal {
                    SagaSignal::FulfillmentStarted { category } => {
                        recorder
                            .record(&[SagaEvent::fulfillment_started(category)])
                            .await?;
                        if deadline.is_none() {
                            deadline = Some(Box::pin(tokio::time::sleep(window)));
                            recorder.record(&[SagaEvent::deadline_armed(window)]).await?;
                            metrics::counter!("fulfillment_deadlines_armed").increment(1);
                            tracing::info!(%category, window_secs = window.as_secs(), "fulfillment deadline armed");
                        }
                    }
                },
                (category, outcome) = next_closed(&mut outstanding.handles) => {
                    outstanding.remove(category);
                    self.on_fulfillment_closed(recorder, category, outcome).await?;
                }
                () = expired(&mut deadline) => {
                    return Err(OrderError::FulfillmentDeadlineExceeded { window });
                }
                _ = cancel.cancelled() => return Err(OrderError::OrderCanceled),
            }
        }

        Ok(())
    }

    async fn on_fulfillment_closed(
        &self,
        recorder: &mut Recorder<J>,
        category: Category,
        outcome: Result<FulfillmentOutcome, JoinError>,
    ) -> Result<(), OrderError> {
        let failure = match outcome {
            Ok(Ok(closure)) => {
                tracing::info!(%category, ?closure, "fulfillment closed");
                None
            }
            Ok(Err(FulfillmentProcessError::ItemFailed { line, name })) => {
                Some(OrderError::ItemFulfillmentFailed {
                    category,
                    line,
                    name,
                })
            }
            Ok(Err(error)) => Some(OrderError::FulfillmentAborted {
                category,
                reason: error.to_string(),
            }),
            Err(join_error) => Some(OrderError::FulfillmentAborted {
                category,
                reason: join_error.to_string(),
            }),
        };

        recorder
            .record(&[SagaEvent::fulfillment_closed(
                category,
                failure.as_ref().map(ToString::to_string),
            )])
            .await?;

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Refunds the charge.
    ///
    /// The refund runs detached: it completes even if this saga is dropped
    /// while waiting for it. A failed refund is recorded and logged; the
    /// saga's outcome stays the original error.
    #[tracing::instrument(skip_all, fields(reason = error.kind()))]
    async fn compensate(&self, recorder: &mut Recorder<J>, receipt: PaymentReceipt, error: &OrderError) {
        record_quietly(
            recorder,
            &[SagaEvent::compensation_started(error.to_string())],
        )
        .await;

        let payment = Arc::clone(&self.context.payment);
        let options = self.context.config.activity.clone();
        let refund_receipt = receipt.clone();
        let refund = scope::detached(async move {
            activity::execute("refund_payment", &options, || payment.refund(&refund_receipt)).await
        });

        let event = match refund.await {
            Ok(Ok(())) => {
                metrics::counter!("refunds_issued").increment(1);
                tracing::info!(auth_code = %receipt.auth_code, "payment refunded");
                SagaEvent::refund_issued(receipt)
            }
            Ok(Err(refund_error)) => {
                metrics::counter!("refunds_failed").increment(1);
                tracing::error!(auth_code = %receipt.auth_code, error = %refund_error, "refund failed");
                SagaEvent::refund_failed(refund_error.to_string())
            }
            Err(join_error) => {
                metrics::counter!("refunds_failed").increment(1);
                tracing::error!(auth_code = %receipt.auth_code, error = %join_error, "refund task died");
                SagaEvent::refund_failed(join_error.to_string())
            }
        };
        record_quietly(recorder, &[event]).await;
    }

    async fn complete(&self, recorder: &mut Recorder<J>) -> OrderSummary {
        let units = self.request.unit_count();
        record_quietly(recorder, &[SagaEvent::order_completed(units)]).await;

        // Best effort: a failed credit never fails the order.
        let loyalty_credited = match &self.request.customer {
            Some(customer) => match self.context.ledgers.credit(customer.clone(), units).await {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(%customer, %error, "loyalty credit failed");
                    false
                }
            },
            None => false,
        };

        OrderSummary {
            order_id: self.order_id,
            units,
            loyalty_credited,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_ready_closures_are_taken_in_category_order() {
        let mut handles = BTreeMap::new();
        handles.insert(Category::Food, tokio::spawn(async { "food" }));
        handles.insert(Category::Beverage, tokio::spawn(async { "beverage" }));
        while !handles.values().all(JoinHandle::is_finished) {
            tokio::task::yield_now().await;
        }

        let (first, result) = next_closed(&mut handles).await;
        assert_eq!(first, Category::Beverage);
        assert_eq!(result.unwrap(), "beverage");
        handles.remove(&first);

        let (second, result) = next_closed(&mut handles).await;
        assert_eq!(second, Category::Food);
        assert_eq!(result.unwrap(), "food");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unarmed_deadline_never_expires() {
        let mut deadline = None;
        let expired_in_time =
            tokio::time::timeout(Duration::from_secs(24 * 60 * 60), expired(&mut deadline)).await;
        assert!(expired_in_time.is_err());

        let mut deadline = Some(Box::pin(tokio::time::sleep(Duration::from_secs(60))));
        let expired_in_time =
            tokio::time::timeout(Duration::from_secs(61), expired(&mut deadline)).await;
        assert!(expired_in_time.is_ok());
    }

    #[test]
    fn test_cancel_all_cancels_every_process() {
        let mut outstanding = Outstanding::default();
        let tokens = [CancellationToken::new(), CancellationToken::new()];
        outstanding.cancels.insert(Category::Beverage, tokens[0].clone());
        outstanding.cancels.insert(Category::Food, tokens[1].clone());

        outstanding.cancel_all();
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
    }
}
