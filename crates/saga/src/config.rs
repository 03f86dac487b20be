//! Engine configuration.

use std::time::Duration;

use crate::activity::ActivityOptions;

/// Tunables shared by every process of an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// How long an order may take once staff started on it.
    pub fulfillment_window: Duration,

    /// History length at which a ledger is advised to checkpoint.
    pub ledger_checkpoint_after: usize,

    /// Timeout and retry applied to payment calls.
    pub activity: ActivityOptions,

    /// How long a finished order stays queryable through the cafe.
    pub finished_retention: Duration,
}

impl EngineConfig {
    pub fn with_fulfillment_window(mut self, window: Duration) -> Self {
        self.fulfillment_window = window;
        self
    }

    pub fn with_ledger_checkpoint_after(mut self, entries: usize) -> Self {
        self.ledger_checkpoint_after = entries.max(1);
        self
    }

    pub fn with_activity(mut self, activity: ActivityOptions) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_finished_retention(mut self, retention: Duration) -> Self {
        self.finished_retention = retention;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fulfillment_window: Duration::from_secs(15 * 60),
            ledger_checkpoint_after: 1000,
            activity: ActivityOptions::default(),
            finished_retention: Duration::from_secs(10 * 60),
        }
    }
}
