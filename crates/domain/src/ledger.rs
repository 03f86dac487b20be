//! Customer loyalty account.

use common::CustomerId;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Checkpointable, DomainEvent};

/// Points credited to an account when it is first created.
pub const STARTING_BALANCE: u64 = 100;

/// Events recorded by a loyalty account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LedgerEvent {
    /// Points earned by a completed order.
    PointsEarned { amount: u64 },
}

impl DomainEvent for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::PointsEarned { .. } => "PointsEarned",
        }
    }
}

/// State carried from one ledger instance into the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCheckpoint {
    pub customer: CustomerId,
    pub points: u64,
}

/// A customer's loyalty point balance.
///
/// The balance never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    customer: CustomerId,
    points: u64,
}

impl Aggregate for LoyaltyAccount {
    type Event = LedgerEvent;

    fn aggregate_type() -> &'static str {
        "CustomerLedger"
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            LedgerEvent::PointsEarned { amount } => self.points += amount,
        }
    }
}

impl Checkpointable for LoyaltyAccount {
    type Checkpoint = LedgerCheckpoint;

    fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            customer: self.customer.clone(),
            points: self.points,
        }
    }

    fn resume(checkpoint: LedgerCheckpoint) -> Self {
        Self {
            customer: checkpoint.customer,
            points: checkpoint.points,
        }
    }
}

impl LoyaltyAccount {
    /// Opens a brand-new account at the starting balance.
    ///
    /// Only for customers with no recorded history; a returning customer is
    /// rebuilt with [`Checkpointable::resume`] instead.
    pub fn open(customer: CustomerId) -> Self {
        Self {
            customer,
            points: STARTING_BALANCE,
        }
    }

    /// Returns the account owner.
    pub fn customer(&self) -> &CustomerId {
        &self.customer
    }

    /// Returns the current balance.
    pub fn balance(&self) -> u64 {
        self.points
    }

    /// Records points earned by an order.
    pub fn earn(&self, amount: u64) -> Vec<LedgerEvent> {
        vec![LedgerEvent::PointsEarned { amount }]
    }
}
