//! Read model of every inventory, fed from the global log.

use std::collections::HashMap;

use async_trait::async_trait;
use eventide_core::aggregate::AggregateRoot;
use eventide_core::error::DomainError;
use eventide_core::projection::ReadProjection;
use eventide_core::serializer::{EventRegistry, EventSerializer};
use eventide_core::store::StreamEventData;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::aggregates::Inventory;
use crate::domain::events::{InventoryEvent, registry};

/// Denormalized summary of one inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    /// The inventory identifier.
    pub inventory_id: Uuid,
    /// Who the inventory belongs to.
    pub owner: String,
    /// Whether the inventory accepts changes.
    pub open: bool,
    /// Number of items held.
    pub item_count: usize,
    /// Number of items equipped.
    pub equipped_count: usize,
    /// Last event number applied from the inventory's stream.
    pub last_event_number: i64,
}

#[derive(Debug, Default)]
struct Entry {
    summary: Option<InventorySummary>,
    items: HashMap<Uuid, bool>,
    last_event_number: Option<i64>,
}

/// Keeps an `InventorySummary` per inventory.
///
/// Events from other contexts are ignored. Each stream's last applied event
/// number is remembered, so a redelivered event is skipped.
#[derive(Debug)]
pub struct InventoryReadModel {
    registry: EventRegistry<InventoryEvent>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for InventoryReadModel {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryReadModel {
    /// Projection name, also the checkpoint key.
    pub const NAME: &'static str = "inventory-summary";

    /// Creates an empty read model.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: registry(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the summary for `inventory_id`, if it has been projected.
    pub async fn summary(&self, inventory_id: Uuid) -> Option<InventorySummary> {
        self.entries
            .read()
            .await
            .get(&Inventory::stream_id(&inventory_id))
            .and_then(|entry| entry.summary.clone())
    }

    /// All projected inventories that are still open, ordered by id.
    pub async fn open_inventories(&self) -> Vec<InventorySummary> {
        let mut open: Vec<InventorySummary> = self
            .entries
            .read()
            .await
            .values()
            .filter_map(|entry| entry.summary.clone())
            .filter(|summary| summary.open)
            .collect();
        open.sort_by_key(|summary| summary.inventory_id);
        open
    }
}

fn refresh_counts(entry: &mut Entry) {
    if let Some(summary) = entry.summary.as_mut() {
        summary.item_count = entry.items.len();
        summary.equipped_count = entry.items.values().filter(|equipped| **equipped).count();
    }
}

#[async_trait]
impl ReadProjection for InventoryReadModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn project(&self, event: &StreamEventData) -> Result<(), DomainError> {
        if !self.registry.is_registered(&event.event_type) {
            return Ok(());
        }
        let decoded = self.registry.decode(&event.event_type, &event.data)?;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(event.stream_id.clone()).or_default();
        if entry
            .last_event_number
            .is_some_and(|last| event.event_number <= last)
        {
            tracing::trace!(
                stream_id = %event.stream_id,
                event_number = event.event_number,
                "event already projected; skipping"
            );
            return Ok(());
        }

        match decoded {
            InventoryEvent::Created(payload) => {
                entry.summary = Some(InventorySummary {
                    inventory_id: payload.inventory_id,
                    owner: payload.owner,
                    open: true,
                    item_count: 0,
                    equipped_count: 0,
                    last_event_number: event.event_number,
                });
            }
            InventoryEvent::ItemAdded(payload) => {
                entry.items.entry(payload.item_id).or_insert(false);
            }
            InventoryEvent::ItemRemoved(payload) => {
                entry.items.remove(&payload.item_id);
            }
            InventoryEvent::ItemEquipped(payload) => {
                entry.items.insert(payload.item_id, true);
            }
            InventoryEvent::Closed(_) => {
                if let Some(summary) = entry.summary.as_mut() {
                    summary.open = false;
                }
            }
        }
        refresh_counts(entry);
        if let Some(summary) = entry.summary.as_mut() {
            summary.last_event_number = event.event_number;
        }
        entry.last_event_number = Some(event.event_number);
        Ok(())
    }
}
