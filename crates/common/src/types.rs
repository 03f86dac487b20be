use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used to derive stable process IDs from business keys.
const PROCESS_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_4c2e_9b7d_4e0a_8c35_d2f1_0b9e_7a64);

/// Unique identifier for a logical process (an order saga, a fulfillment
/// sub-process, a customer ledger).
///
/// Wraps a UUID so process IDs cannot be mixed up with other UUID-based
/// identifiers. Ordering is total, which keeps maps keyed by process ID
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(Uuid);

impl ProcessId {
    /// Creates a new random process ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a process ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derives the stable ID of a customer's ledger process.
    ///
    /// The same customer always maps to the same ID, so a ledger can be
    /// found again after its process has ended.
    pub fn for_customer(customer: &CustomerId) -> Self {
        let key = format!("customer:{}", customer.as_str());
        Self(Uuid::new_v5(&PROCESS_NAMESPACE, key.as_bytes()))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ProcessId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ProcessId> for Uuid {
    fn from(id: ProcessId) -> Self {
        id.0
    }
}

/// Customer identity (the e-mail address a loyalty account is keyed on).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    /// Creates a customer ID from its identity string.
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CustomerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CustomerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_id_new_creates_unique_ids() {
        let id1 = ProcessId::new();
        let id2 = ProcessId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn process_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = ProcessId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn customer_process_id_is_stable() {
        let alice = CustomerId::new("alice@example.com");
        let bob = CustomerId::new("bob@example.com");

        assert_eq!(
            ProcessId::for_customer(&alice),
            ProcessId::for_customer(&alice.clone())
        );
        assert_ne!(ProcessId::for_customer(&alice), ProcessId::for_customer(&bob));
    }

    #[test]
    fn customer_id_serializes_as_plain_string() {
        let id = CustomerId::new("alice@example.com");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"alice@example.com\"");
        let deserialized: CustomerId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
