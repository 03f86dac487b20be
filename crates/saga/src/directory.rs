//! Lookup of fulfillment processes by order and category.

use std::collections::BTreeMap;
use std::sync::Arc;

use domain::{Category, FulfillmentStatus, OrderId};
use tokio::sync::RwLock;

use crate::fulfillment::FulfillmentClient;

/// Directory of fulfillment processes, shared by sagas and the boundary.
///
/// Entries outlive their processes so the final status of an order stays
/// queryable until the order is forgotten. Cloning is cheap and every clone
/// shares the same entries.
#[derive(Debug, Clone, Default)]
pub struct FulfillmentDirectory {
    entries: Arc<RwLock<BTreeMap<Category, BTreeMap<OrderId, FulfillmentClient>>>>,
}

impl FulfillmentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn register(&self, client: FulfillmentClient) {
        self.entries
            .write()
            .await
            .entry(client.category())
            .or_default()
            .insert(client.order_id(), client);
    }

    /// Drops every fulfillment of an order.
    pub(crate) async fn forget(&self, order_id: OrderId) {
        let mut entries = self.entries.write().await;
        for clients in entries.values_mut() {
            clients.remove(&order_id);
        }
        entries.retain(|_, clients| !clients.is_empty());
    }

    /// Returns the client of one category of an order.
    pub async fn get(&self, order_id: OrderId, category: Category) -> Option<FulfillmentClient> {
        self.entries
            .read()
            .await
            .get(&category)
            .and_then(|clients| clients.get(&order_id))
            .cloned()
    }

    /// Returns the open fulfillments of a category, ordered by order ID.
    pub async fn open_for(&self, category: Category) -> Vec<(OrderId, FulfillmentStatus)> {
        self.entries
            .read()
            .await
            .get(&category)
            .map(|clients| {
                clients
                    .iter()
                    .filter(|(_, client)| client.is_open())
                    .map(|(order_id, client)| (*order_id, client.status()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of registered fulfillments.
    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
