use serde::{Deserialize, Serialize};

use crate::{Category, DomainEvent, LineStatus};

/// How a fulfillment closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Closure {
    /// Every line was completed.
    Completed,

    /// A line failed; the whole fulfillment fails with it.
    Failed { line: u32, name: String },

    /// The owner asked the fulfillment to stop.
    Canceled,
}

impl Closure {
    /// Returns true if this closure is a business failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Closure::Failed { .. })
    }
}

/// Events recorded by a fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FulfillmentEvent {
    /// The fulfillment was created with these unit lines, all pending.
    Opened {
        category: Category,
        lines: Vec<String>,
    },

    /// A line moved to a new status.
    ItemStatusChanged { line: u32, status: LineStatus },

    /// Fulfillment visibly began; the owner is notified once.
    FulfillmentStarted,

    /// The fulfillment closed and accepts no further updates.
    Closed(Closure),
}

impl DomainEvent for FulfillmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FulfillmentEvent::Opened { .. } => "FulfillmentOpened",
            FulfillmentEvent::ItemStatusChanged { .. } => "ItemStatusChanged",
            FulfillmentEvent::FulfillmentStarted => "FulfillmentStarted",
            FulfillmentEvent::Closed(_) => "FulfillmentClosed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        assert_eq!(
            FulfillmentEvent::ItemStatusChanged {
                line: 1,
                status: LineStatus::Started
            }
            .event_type(),
            "ItemStatusChanged"
        );
        assert_eq!(
            FulfillmentEvent::FulfillmentStarted.event_type(),
            "FulfillmentStarted"
        );
        assert_eq!(
            FulfillmentEvent::Closed(Closure::Canceled).event_type(),
            "FulfillmentClosed"
        );
    }

    #[test]
    fn test_closed_payload_names_the_failed_line() {
        let event = FulfillmentEvent::Closed(Closure::Failed {
            line: 2,
            name: "Bagel".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Closed");
        assert_eq!(json["data"]["kind"], "failed");
        assert_eq!(json["data"]["line"], 2);
        assert_eq!(json["data"]["name"], "Bagel");

        let deserialized: FulfillmentEvent = serde_json::from_value(json).unwrap();
        assert_eq!(deserialized, event);
    }
}
