//! Order fulfillment orchestration for the cafe.
//!
//! This crate runs the long-lived processes of the engine on tokio:
//! - [`OrderSaga`] charges payment, fans an order out into one fulfillment
//!   sub-process per category, races them against a lazily armed deadline and
//!   refunds on failure
//! - the fulfillment sub-process tracks item progress reported by staff and is
//!   reached through a [`FulfillmentClient`]
//! - [`LoyaltyLedgers`] keeps one indefinitely running ledger per customer that
//!   checkpoints itself and continues as a fresh instance
//!
//! [`Cafe`] is the boundary the outside world talks to.

pub mod activity;
pub mod aggregate;
pub mod cafe;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod events;
pub mod fulfillment;
pub mod ledger;
mod recorder;
pub mod scope;
pub mod services;
pub mod state;

pub use activity::{ActivityOptions, RetryPolicy, Retryable};
pub use aggregate::{RefundOutcome, SagaInstance};
pub use cafe::{Cafe, OrderHandle};
pub use config::EngineConfig;
pub use coordinator::{OrderSaga, OrderSummary, SagaContext, SagaSignal};
pub use directory::FulfillmentDirectory;
pub use error::{CafeError, FulfillmentProcessError, LedgerError, OrderError};
pub use events::SagaEvent;
pub use fulfillment::FulfillmentClient;
pub use ledger::{EpochEnd, LedgerView, LoyaltyLedgers};
pub use services::{InMemoryPaymentService, PaymentError, PaymentReceipt, PaymentService};
pub use state::SagaState;
