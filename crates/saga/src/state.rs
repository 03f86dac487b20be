//! Order saga lifecycle.

use serde::{Deserialize, Serialize};

/// The state of an order saga.
///
/// State transitions:
/// ```text
/// NotStarted ──► Charging ──► Fulfilling ──┬──► Completed
///                   │                      └──► Compensating ──► Failed
///                   └──────────────────────────────────────────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Nothing recorded yet.
    #[default]
    NotStarted,

    /// The order was accepted and payment is being charged.
    Charging,

    /// Payment is held and fulfillments are in progress.
    Fulfilling,

    /// A terminal error occurred and the charge is being refunded.
    Compensating,

    /// Every fulfillment closed successfully (terminal state).
    Completed,

    /// The order failed (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    /// Returns true while payment is held for the order.
    pub fn holds_payment(&self) -> bool {
        matches!(self, SagaState::Fulfilling | SagaState::Compensating)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::Charging => "Charging",
            SagaState::Fulfilling => "Fulfilling",
            SagaState::Compensating => "Compensating",
            SagaState::Completed => "Completed",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
