use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Department responsible for a line item.
///
/// Variants are declared in lexicographic order of their names, so the
/// derived ordering is the fixed order used when fanning an order out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Drinks, prepared by the barista.
    Beverage,

    /// Food, prepared by the kitchen.
    Food,
}

impl Category {
    /// All categories in fan-out order.
    pub const ALL: [Category; 2] = [Category::Beverage, Category::Food];

    /// Returns the category name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Beverage => "beverage",
            Category::Food => "food",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beverage" => Ok(Category::Beverage),
            "food" => Ok(Category::Food),
            _ => Err(ParseCategoryError(s.to_string())),
        }
    }
}
