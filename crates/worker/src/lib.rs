//! Process host for the cafe fulfillment engine.
//!
//! Boots a [`Cafe`] over the in-memory journal and payment service, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;

use journal::InMemoryJournal;
use saga::{Cafe, InMemoryPaymentService};

use config::Config;

/// The engine as the worker runs it.
pub type DefaultCafe = Cafe<InMemoryJournal, InMemoryPaymentService>;

/// Creates the engine with in-memory collaborators.
pub fn create_cafe(config: &Config) -> DefaultCafe {
    Cafe::new(
        InMemoryJournal::new(),
        InMemoryPaymentService::new(),
        config.engine_config(),
    )
}

/// Registers descriptions for the metrics the engine emits.
pub fn describe_metrics() {
    metrics::describe_counter!("orders_started_total", "Orders accepted for fulfillment");
    metrics::describe_counter!("orders_completed", "Orders whose fulfillments all closed");
    metrics::describe_counter!("orders_failed", "Orders that ended with an error, by reason");
    metrics::describe_histogram!(
        "order_duration_seconds",
        metrics::Unit::Seconds,
        "Time from acceptance to the terminal outcome"
    );
    metrics::describe_counter!(
        "fulfillment_deadlines_armed",
        "Orders whose fulfillment deadline started running"
    );
    metrics::describe_counter!("refunds_issued", "Charges refunded by compensation");
    metrics::describe_counter!("refunds_failed", "Refunds that could not be issued");
    metrics::describe_counter!("loyalty_points_credited", "Loyalty points handed to ledgers");
    metrics::describe_counter!("ledger_checkpoints", "Ledger epochs continued as new");
}
