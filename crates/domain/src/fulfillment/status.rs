use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Category;

/// Status of one unit line.
///
/// ```text
/// Pending ──► Started ──► Completed
///    │           │
///    └───────────┴──────► Failed
/// ```
/// `Pending ──► Completed` is also accepted: staff may finish an item
/// without reporting that they started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    /// Not picked up yet.
    #[default]
    Pending,

    /// Staff are working on it.
    Started,

    /// Done (terminal).
    Completed,

    /// Could not be made (terminal, fails the fulfillment).
    Failed,
}

impl LineStatus {
    /// Returns true if the line can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LineStatus::Completed | LineStatus::Failed)
    }

    /// Returns true if moving to `next` is a legal transition.
    pub fn can_become(&self, next: LineStatus) -> bool {
        match self {
            LineStatus::Pending => next != LineStatus::Pending,
            LineStatus::Started => matches!(next, LineStatus::Completed | LineStatus::Failed),
            LineStatus::Completed | LineStatus::Failed => false,
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineStatus::Pending => "pending",
            LineStatus::Started => "started",
            LineStatus::Completed => "completed",
            LineStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown item status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for LineStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(LineStatus::Pending),
            "started" => Ok(LineStatus::Started),
            "completed" => Ok(LineStatus::Completed),
            "failed" => Ok(LineStatus::Failed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Externally reported progress of one line (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatusUpdate {
    pub line: u32,
    pub status: LineStatus,
}

impl ItemStatusUpdate {
    /// Creates an update for a 1-based line index.
    pub fn new(line: u32, status: LineStatus) -> Self {
        Self { line, status }
    }
}

/// One unit being prepared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentLine {
    pub name: String,
    pub status: LineStatus,
}

impl FulfillmentLine {
    /// Creates a pending line.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: LineStatus::Pending,
        }
    }
}

/// Read-only snapshot of a fulfillment, as answered to status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentStatus {
    pub category: Category,
    pub open: bool,
    pub lines: Vec<FulfillmentLine>,
}

impl FulfillmentStatus {
    /// Returns the number of lines with the given status.
    pub fn count(&self, status: LineStatus) -> usize {
        self.lines.iter().filter(|line| line.status == status).count()
    }
}
