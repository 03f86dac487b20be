//! Payment service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::activity::Retryable;

/// Proof of a successful charge; all a refund needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Authorization code assigned by the payment provider.
    pub auth_code: String,
}

/// Errors reported by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The provider refused the operation.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The provider could not be reached.
    #[error("Payment service unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time.
    #[error("Payment call timed out after {0:?}")]
    Timeout(Duration),
}

impl Retryable for PaymentError {
    fn is_retryable(&self) -> bool {
        !matches!(self, PaymentError::Declined(_))
    }

    fn timed_out(after: Duration) -> Self {
        PaymentError::Timeout(after)
    }
}

/// Trait for payment processing operations.
///
/// Calls are retried by the activity executor, never by the caller.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the payment method behind `token`.
    async fn charge(&self, token: &str) -> Result<PaymentReceipt, PaymentError>;

    /// Refunds a previous charge.
    async fn refund(&self, receipt: &PaymentReceipt) -> Result<(), PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    /// Active charges by auth code.
    charges: HashMap<String, String>,
    refunded: Vec<String>,
    next_id: u32,
    fail_on_charge: bool,
    fail_on_refund: bool,
    transient_charge_failures: u32,
    charge_calls: u32,
    refund_calls: u32,
}

/// In-memory payment service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every charge while set.
    pub async fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().await.fail_on_charge = fail;
    }

    /// Fails every refund while set.
    pub async fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().await.fail_on_refund = fail;
    }

    /// Makes the next `count` charges fail as unavailable.
    pub async fn fail_next_charges(&self, count: u32) {
        self.state.write().await.transient_charge_failures = count;
    }

    /// Returns how many times `charge` was called.
    pub async fn charge_calls(&self) -> u32 {
        self.state.read().await.charge_calls
    }

    /// Returns how many times `refund` was called.
    pub async fn refund_calls(&self) -> u32 {
        self.state.read().await.refund_calls
    }

    /// Returns the number of charges not refunded.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.charges.len()
    }

    /// Returns true if the charge was refunded.
    pub async fn was_refunded(&self, receipt: &PaymentReceipt) -> bool {
        self.state.read().await.refunded.contains(&receipt.auth_code)
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn charge(&self, token: &str) -> Result<PaymentReceipt, PaymentError> {
        let mut state = self.state.write().await;
        state.charge_calls += 1;

        if state.transient_charge_failures > 0 {
            state.transient_charge_failures -= 1;
            return Err(PaymentError::Unavailable("connection reset".to_string()));
        }
        if state.fail_on_charge {
            return Err(PaymentError::Declined("card declined".to_string()));
        }

        state.next_id += 1;
        let auth_code = format!("AUTH-{:04}", state.next_id);
        state.charges.insert(auth_code.clone(), token.to_string());

        Ok(PaymentReceipt { auth_code })
    }

    async fn refund(&self, receipt: &PaymentReceipt) -> Result<(), PaymentError> {
        let mut state = self.state.write().await;
        state.refund_calls += 1;

        if state.fail_on_refund {
            return Err(PaymentError::Declined("refund rejected".to_string()));
        }
        if state.charges.remove(&receipt.auth_code).is_none() {
            return Err(PaymentError::Declined(format!(
                "unknown charge {}",
                receipt.auth_code
            )));
        }
        state.refunded.push(receipt.auth_code.clone());

        Ok(())
    }
}
