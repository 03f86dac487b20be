use std::collections::BTreeMap;

use common::CustomerId;
use serde::{Deserialize, Serialize};

use super::{Category, OrderRequestError};

/// One line of an order as placed by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Department that prepares the item.
    pub category: Category,
    /// Display name.
    pub name: String,
    /// Number of units; each unit is fulfilled separately.
    pub quantity: u32,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(category: Category, name: impl Into<String>, quantity: u32) -> Self {
        Self {
            category,
            name: name.into(),
            quantity,
        }
    }

    /// Creates a food line item.
    pub fn food(name: impl Into<String>, quantity: u32) -> Self {
        Self::new(Category::Food, name, quantity)
    }

    /// Creates a beverage line item.
    pub fn beverage(name: impl Into<String>, quantity: u32) -> Self {
        Self::new(Category::Beverage, name, quantity)
    }
}

/// A purchase order submitted for fulfillment. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Loyalty identity; anonymous orders earn no points.
    pub customer: Option<CustomerId>,
    /// Token the payment provider charges.
    pub payment_token: String,
    /// Ordered line items.
    pub items: Vec<LineItem>,
}

impl OrderRequest {
    /// Creates an anonymous order.
    pub fn new(payment_token: impl Into<String>, items: Vec<LineItem>) -> Self {
        Self {
            customer: None,
            payment_token: payment_token.into(),
            items,
        }
    }

    /// Attaches a customer identity to the order.
    pub fn for_customer(mut self, customer: impl Into<CustomerId>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    /// Checks that the order can be accepted.
    pub fn validate(&self) -> Result<(), OrderRequestError> {
        if self.items.is_empty() {
            return Err(OrderRequestError::NoItems);
        }

        for (index, item) in self.items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(OrderRequestError::MissingName { index });
            }
            if item.quantity == 0 {
                return Err(OrderRequestError::InvalidQuantity {
                    name: item.name.clone(),
                    quantity: item.quantity,
                });
            }
        }

        Ok(())
    }

    /// Groups line items by category.
    ///
    /// The map iterates in [`Category`] order and each group keeps the
    /// original item order, so the partition is the same for every run.
    pub fn partition(&self) -> BTreeMap<Category, Vec<LineItem>> {
        let mut partitions: BTreeMap<Category, Vec<LineItem>> = BTreeMap::new();
        for item in &self.items {
            partitions
                .entry(item.category)
                .or_default()
                .push(item.clone());
        }
        partitions
    }

    /// Returns the total number of units across all line items.
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}
