//! Fulfillment sub-process.
//!
//! One task per category of an order owns a [`Fulfillment`] and handles
//! item status updates one at a time. Every accepted change is journaled
//! before it is applied, and the resulting snapshot is published on a watch
//! channel so status queries never wait for the process.

use std::sync::Arc;

use domain::{
    Aggregate, Category, Closure, Fulfillment, FulfillmentError, FulfillmentEvent,
    FulfillmentStatus, ItemStatusUpdate, LineItem, OrderId, ProcessId,
};
use journal::Journal;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::coordinator::SagaSignal;
use crate::error::FulfillmentProcessError;
use crate::recorder::Recorder;

/// How a fulfillment process ended.
pub type FulfillmentOutcome = Result<Closure, FulfillmentProcessError>;

enum FulfillmentCommand {
    UpdateItem {
        update: ItemStatusUpdate,
        reply: oneshot::Sender<Result<(), FulfillmentError>>,
    },
}

/// Handle to a running (or finished) fulfillment process.
///
/// The last published snapshot stays readable after the process ended.
#[derive(Debug, Clone)]
pub struct FulfillmentClient {
    process_id: ProcessId,
    order_id: OrderId,
    category: Category,
    commands: mpsc::UnboundedSender<FulfillmentCommand>,
    status: watch::Receiver<FulfillmentStatus>,
}

impl FulfillmentClient {
    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Returns the latest snapshot without waiting for the process.
    pub fn status(&self) -> FulfillmentStatus {
        self.status.borrow().clone()
    }

    /// Returns true while the fulfillment accepts updates.
    pub fn is_open(&self) -> bool {
        self.status.borrow().open
    }

    /// Sends an item status update and waits for it to be validated.
    ///
    /// A process that already ended answers [`FulfillmentError::Closed`].
    pub async fn update_item(&self, update: ItemStatusUpdate) -> Result<(), FulfillmentError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(FulfillmentCommand::UpdateItem { update, reply })
            .map_err(|_| FulfillmentError::Closed)?;
        response.await.unwrap_or(Err(FulfillmentError::Closed))
    }
}

/// Spawns the fulfillment process of one category of an order.
pub(crate) fn spawn<J: Journal + 'static>(
    journal: Arc<J>,
    order_id: OrderId,
    category: Category,
    items: &[LineItem],
    parent: mpsc::UnboundedSender<SagaSignal>,
    cancel: CancellationToken,
) -> (FulfillmentClient, JoinHandle<FulfillmentOutcome>) {
    let state = Fulfillment::open(category, items);
    let process_id = ProcessId::new();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(state.status());

    let process = FulfillmentProcess {
        recorder: Recorder::new(journal, process_id, Fulfillment::aggregate_type()),
        state,
        commands: commands_rx,
        status: status_tx,
        parent,
        cancel,
    };
    let span = tracing::info_span!("fulfillment", %order_id, %category, %process_id);
    let handle = tokio::spawn(process.run().instrument(span));

    let client = FulfillmentClient {
        process_id,
        order_id,
        category,
        commands: commands_tx,
        status: status_rx,
    };
    (client, handle)
}

struct FulfillmentProcess<J> {
    state: Fulfillment,
    recorder: Recorder<J>,
    commands: mpsc::UnboundedReceiver<FulfillmentCommand>,
    status: watch::Sender<FulfillmentStatus>,
    parent: mpsc::UnboundedSender<SagaSignal>,
    cancel: CancellationToken,
}

impl<J: Journal> FulfillmentProcess<J> {
    async fn run(mut self) -> FulfillmentOutcome {
        let opened = self.state.opened();
        self.recorder.record(&[opened]).await?;
        tracing::info!(lines = self.state.line_count(), "fulfillment opened");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return self.close_canceled().await,
                command = self.commands.recv() => match command {
                    Some(FulfillmentCommand::UpdateItem { update, reply }) => {
                        let events = match self.state.update_item(update) {
                            Ok(events) => events,
                            Err(error) => {
                                tracing::debug!(line = update.line, %error, "item status update rejected");
                                let _ = reply.send(Err(error));
                                continue;
                            }
                        };
                        self.commit(events).await?;
                        let _ = reply.send(Ok(()));

                        if let Some(closure) = self.state.closure().cloned() {
                            return finish(closure);
                        }
                    }
                    None => return self.close_canceled().await,
                },
            }
        }
    }

    /// Journals, applies and publishes events, then notifies the parent.
    async fn commit(&mut self, events: Vec<FulfillmentEvent>) -> Result<(), FulfillmentProcessError> {
        if events.is_empty() {
            return Ok(());
        }

        self.recorder.record(&events).await?;
        let notify_parent = events.contains(&FulfillmentEvent::FulfillmentStarted);
        self.state.apply_events(events);
        self.status.send_replace(self.state.status());

        if notify_parent {
            let category = self.state.category();
            self.parent
                .send(SagaSignal::FulfillmentStarted { category })
                .map_err(|_| FulfillmentProcessError::ParentUnreachable)?;
            tracing::info!("fulfillment started");
        }
        Ok(())
    }

    async fn close_canceled(&mut self) -> FulfillmentOutcome {
        let events = self.state.cancel();
        self.commit(events).await?;
        tracing::info!("fulfillment canceled");
        Ok(Closure::Canceled)
    }
}

fn finish(closure: Closure) -> FulfillmentOutcome {
    match closure {
        Closure::Failed { line, name } => {
            tracing::warn!(line, %name, "fulfillment failed");
            Err(FulfillmentProcessError::ItemFailed { line, name })
        }
        closure => {
            tracing::info!(?closure, "fulfillment closed");
            Ok(closure)
        }
    }
}
