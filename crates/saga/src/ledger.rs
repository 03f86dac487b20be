//! Customer loyalty ledgers.
//!
//! Each customer with at least one credited order has one ledger process. The
//! process never finishes on its own: once its history reaches the configured
//! length it checkpoints its balance and continues as a fresh epoch, so its
//! history stays bounded no matter how many orders the customer places.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

use common::{CustomerId, ProcessId};
use domain::{Aggregate, Checkpointable, LedgerCheckpoint, LedgerEvent, LoyaltyAccount};
use journal::{Checkpoint, Journal, JournalError, Sequence};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::Instrument;

use crate::error::LedgerError;
use crate::recorder::Recorder;

/// Latest known state of a running ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerView {
    pub points: u64,
    /// Number of times the ledger has continued as new.
    pub epoch: u64,
}

/// How one epoch of a ledger process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpochEnd {
    /// History grew long enough; continue as a fresh epoch from this state.
    ContinueAsNew(LedgerCheckpoint),
    /// Nothing can reach the ledger anymore.
    Closed,
}

struct LedgerHandle {
    events: mpsc::UnboundedSender<LedgerEvent>,
    view: watch::Receiver<LedgerView>,
}

/// Registry of customer ledger processes.
///
/// Crediting a customer sends to the running ledger, starting it first when
/// needed. A ledger that was never started, or that stopped, is rebuilt from
/// its latest checkpoint plus the history recorded since.
pub struct LoyaltyLedgers<J> {
    journal: Arc<J>,
    checkpoint_after: usize,
    ledgers: Arc<Mutex<HashMap<CustomerId, LedgerHandle>>>,
}

impl<J> Clone for LoyaltyLedgers<J> {
    fn clone(&self) -> Self {
        Self {
            journal: Arc::clone(&self.journal),
            checkpoint_after: self.checkpoint_after,
            ledgers: Arc::clone(&self.ledgers),
        }
    }
}

impl<J: Journal + 'static> LoyaltyLedgers<J> {
    /// Creates an empty registry.
    ///
    /// Ledgers continue as new once their history holds `checkpoint_after`
    /// entries.
    pub fn new(journal: Arc<J>, checkpoint_after: usize) -> Self {
        Self {
            journal,
            checkpoint_after: checkpoint_after.max(1),
            ledgers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Credits points to a customer, starting their ledger if it is not running.
    ///
    /// Credits sent to one customer are applied in the order this method was
    /// called.
    #[tracing::instrument(skip(self, customer), fields(customer = %customer))]
    pub async fn credit(&self, customer: CustomerId, amount: u64) -> Result<(), LedgerError> {
        let event = LedgerEvent::PointsEarned { amount };
        let mut ledgers = self.ledgers.lock().await;

        if let Some(ledger) = ledgers.get(&customer) {
            if ledger.events.send(event).is_ok() {
                metrics::counter!("loyalty_points_credited").increment(amount);
                return Ok(());
            }
            tracing::warn!("ledger process stopped, restarting");
        }

        let ledger = self.start(customer.clone()).await?;
        ledger
            .events
            .send(event)
            .map_err(|_| LedgerError::Unavailable(customer.clone()))?;
        ledgers.insert(customer, ledger);
        metrics::counter!("loyalty_points_credited").increment(amount);
        Ok(())
    }

    /// Returns a customer's balance.
    ///
    /// Answers from the running ledger if there is one, otherwise from the
    /// journal. Returns None for a customer that never earned points.
    pub async fn balance(&self, customer: &CustomerId) -> Result<Option<u64>, LedgerError> {
        if let Some(ledger) = self.ledgers.lock().await.get(customer) {
            return Ok(Some(ledger.view.borrow().points));
        }

        let recovered = self.recover(customer).await?;
        Ok(recovered.map(|(account, _)| account.balance()))
    }

    /// Subscribes to a running ledger's view.
    pub async fn watch(&self, customer: &CustomerId) -> Option<watch::Receiver<LedgerView>> {
        self.ledgers
            .lock()
            .await
            .get(customer)
            .map(|ledger| ledger.view.clone())
    }

    /// Rebuilds an account from its latest checkpoint and the history after it.
    async fn recover(
        &self,
        customer: &CustomerId,
    ) -> Result<Option<(LoyaltyAccount, Sequence)>, LedgerError> {
        let stream = ProcessId::for_customer(customer);
        let checkpoint = self.journal.latest_checkpoint(stream).await?;
        let history = self.journal.history(stream).await?;

        let mut account = match checkpoint {
            Some(checkpoint) => {
                let state: LedgerCheckpoint = checkpoint.into_state().map_err(JournalError::from)?;
                LoyaltyAccount::resume(state)
            }
            None if history.is_empty() => return Ok(None),
            None => LoyaltyAccount::open(customer.clone()),
        };
        for entry in &history {
            account.apply(entry.decode::<LedgerEvent>().map_err(JournalError::from)?);
        }

        let head = self.journal.head(stream).await?;
        Ok(Some((account, head)))
    }

    async fn start(&self, customer: CustomerId) -> Result<LedgerHandle, LedgerError> {
        let (account, head) = match self.recover(&customer).await? {
            Some((account, head)) => {
                tracing::info!(points = account.balance(), %head, "ledger recovered");
                (account, head)
            }
            None => (LoyaltyAccount::open(customer.clone()), Sequence::initial()),
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(LedgerView {
            points: account.balance(),
            epoch: 0,
        });

        let supervisor = LedgerSupervisor {
            recorder: Recorder::resume(
                Arc::clone(&self.journal),
                ProcessId::for_customer(&customer),
                LoyaltyAccount::aggregate_type(),
                head,
            ),
            mailbox: events_rx,
            view: view_tx,
            checkpoint_after: self.checkpoint_after,
        };
        let span = tracing::info_span!("customer_ledger", customer = %customer);
        tokio::spawn(supervisor.run(account).instrument(span));

        Ok(LedgerHandle {
            events: events_tx,
            view: view_rx,
        })
    }
}

/// Longest pause between attempts to write a ledger's history.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

fn write_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(10)
}

/// Owns a ledger's mailbox across epochs.
///
/// Journal failures never drop a credit: the event being handled goes back to
/// the front of the backlog and the write is retried with backoff.
struct LedgerSupervisor<J> {
    recorder: Recorder<J>,
    mailbox: mpsc::UnboundedReceiver<LedgerEvent>,
    view: watch::Sender<LedgerView>,
    checkpoint_after: usize,
}

impl<J: Journal> LedgerSupervisor<J> {
    async fn run(mut self, mut account: LoyaltyAccount) {
        let mut epoch = 0;
        let mut backlog = VecDeque::new();
        let mut backoff = write_backoff().build();

        loop {
            let process = LedgerProcess {
                account: &mut account,
                epoch,
                recorder: &mut self.recorder,
                view: &self.view,
                checkpoint_after: self.checkpoint_after,
            };

            match process.run(&mut self.mailbox, &mut backlog).await {
                Ok(EpochEnd::ContinueAsNew(checkpoint)) => {
                    while let Err(error) = self.save_checkpoint(&checkpoint).await {
                        let delay = backoff.next().unwrap_or(MAX_RETRY_DELAY);
                        tracing::warn!(%error, delay_ms = delay.as_millis() as u64, "failed to save ledger checkpoint, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    metrics::counter!("ledger_checkpoints").increment(1);
                    backoff = write_backoff().build();

                    epoch += 1;
                    account = LoyaltyAccount::resume(checkpoint);
                    self.view.send_replace(LedgerView {
                        points: account.balance(),
                        epoch,
                    });
                    tracing::info!(epoch, points = account.balance(), "ledger continued as new");
                }
                Ok(EpochEnd::Closed) => {
                    tracing::info!("ledger mailbox closed");
                    return;
                }
                Err(error) => {
                    let delay = backoff.next().unwrap_or(MAX_RETRY_DELAY);
                    tracing::warn!(
                        %error,
                        queued = backlog.len(),
                        delay_ms = delay.as_millis() as u64,
                        "ledger write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn save_checkpoint(&self, checkpoint: &LedgerCheckpoint) -> Result<(), LedgerError> {
        let checkpoint = Checkpoint::from_state(
            self.recorder.stream(),
            LoyaltyAccount::aggregate_type(),
            self.recorder.head(),
            checkpoint,
        )
        .map_err(JournalError::from)?;
        self.recorder.journal().save_checkpoint(checkpoint).await?;
        Ok(())
    }
}

/// One epoch of a customer's ledger.
struct LedgerProcess<'a, J> {
    account: &'a mut LoyaltyAccount,
    epoch: u64,
    recorder: &'a mut Recorder<J>,
    view: &'a watch::Sender<LedgerView>,
    checkpoint_after: usize,
}

impl<J: Journal> LedgerProcess<'_, J> {
    /// Handles events until the epoch ends.
    ///
    /// On error the unrecorded event is at the front of `backlog` and the
    /// account is unchanged by it.
    async fn run(
        mut self,
        mailbox: &mut mpsc::UnboundedReceiver<LedgerEvent>,
        backlog: &mut VecDeque<LedgerEvent>,
    ) -> Result<EpochEnd, LedgerError> {
        loop {
            let event = match backlog.pop_front() {
                Some(event) => event,
                None => match mailbox.recv().await {
                    Some(event) => event,
                    None => return Ok(EpochEnd::Closed),
                },
            };
            self.handle_or_requeue(event, backlog).await?;

            if self.recorder.history_len().await? >= self.checkpoint_after {
                // Everything already queued belongs to this epoch.
                while let Some(event) = backlog.pop_front().or_else(|| mailbox.try_recv().ok()) {
                    self.handle_or_requeue(event, backlog).await?;
                }
                return Ok(EpochEnd::ContinueAsNew(self.account.checkpoint()));
            }
        }
    }

    async fn handle_or_requeue(
        &mut self,
        event: LedgerEvent,
        backlog: &mut VecDeque<LedgerEvent>,
    ) -> Result<(), LedgerError> {
        if let Err(error) = self.handle(&event).await {
            backlog.push_front(event);
            return Err(error);
        }
        Ok(())
    }

    async fn handle(&mut self, event: &LedgerEvent) -> Result<(), LedgerError> {
        let LedgerEvent::PointsEarned { amount } = *event;
        let events = self.account.earn(amount);
        self.recorder.record(&events).await?;
        self.account.apply_events(events);

        self.view.send_replace(LedgerView {
            points: self.account.balance(),
            epoch: self.epoch,
        });
        tracing::debug!(amount, points = self.account.balance(), "points earned");
        Ok(())
    }
}
