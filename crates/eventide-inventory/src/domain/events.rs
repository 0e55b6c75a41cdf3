//! Domain events for the inventory context.

use eventide_core::event::DomainEvent;
use eventide_core::serializer::EventRegistry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type identifier for `InventoryCreated`.
pub const INVENTORY_CREATED_EVENT_TYPE: &str = "inventory.created";
/// Event type identifier for `ItemAdded`.
pub const ITEM_ADDED_EVENT_TYPE: &str = "inventory.item_added";
/// Event type identifier for `ItemRemoved`.
pub const ITEM_REMOVED_EVENT_TYPE: &str = "inventory.item_removed";
/// Event type identifier for `ItemEquipped`.
pub const ITEM_EQUIPPED_EVENT_TYPE: &str = "inventory.item_equipped";
/// Event type identifier for `InventoryClosed`.
pub const INVENTORY_CLOSED_EVENT_TYPE: &str = "inventory.closed";

/// Emitted when an inventory is opened for an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCreated {
    /// The inventory identifier.
    pub inventory_id: Uuid,
    /// Who the inventory belongs to.
    pub owner: String,
}

/// Emitted when an item is added to an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    /// The inventory identifier.
    pub inventory_id: Uuid,
    /// The item identifier.
    pub item_id: Uuid,
}

/// Emitted when an item is removed from an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    /// The inventory identifier.
    pub inventory_id: Uuid,
    /// The item identifier.
    pub item_id: Uuid,
}

/// Emitted when an item is equipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEquipped {
    /// The inventory identifier.
    pub inventory_id: Uuid,
    /// The item identifier.
    pub item_id: Uuid,
}

/// Emitted when an inventory stops accepting changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryClosed {
    /// The inventory identifier.
    pub inventory_id: Uuid,
}

/// Every event an `Inventory` produces and replays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEvent {
    /// The inventory has been opened.
    Created(InventoryCreated),
    /// An item has been added to the inventory.
    ItemAdded(ItemAdded),
    /// An item has been removed from the inventory.
    ItemRemoved(ItemRemoved),
    /// An item has been equipped.
    ItemEquipped(ItemEquipped),
    /// The inventory has been closed.
    Closed(InventoryClosed),
}

impl DomainEvent for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => INVENTORY_CREATED_EVENT_TYPE,
            Self::ItemAdded(_) => ITEM_ADDED_EVENT_TYPE,
            Self::ItemRemoved(_) => ITEM_REMOVED_EVENT_TYPE,
            Self::ItemEquipped(_) => ITEM_EQUIPPED_EVENT_TYPE,
            Self::Closed(_) => INVENTORY_CLOSED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Created(body) => serde_json::to_vec(body),
            Self::ItemAdded(body) => serde_json::to_vec(body),
            Self::ItemRemoved(body) => serde_json::to_vec(body),
            Self::ItemEquipped(body) => serde_json::to_vec(body),
            Self::Closed(body) => serde_json::to_vec(body),
        }
    }
}

/// Decoders for every inventory event type.
#[must_use]
pub fn registry() -> EventRegistry<InventoryEvent> {
    EventRegistry::new()
        .register(INVENTORY_CREATED_EVENT_TYPE, InventoryEvent::Created)
        .register(ITEM_ADDED_EVENT_TYPE, InventoryEvent::ItemAdded)
        .register(ITEM_REMOVED_EVENT_TYPE, InventoryEvent::ItemRemoved)
        .register(ITEM_EQUIPPED_EVENT_TYPE, InventoryEvent::ItemEquipped)
        .register(INVENTORY_CLOSED_EVENT_TYPE, InventoryEvent::Closed)
}

#[cfg(test)]
mod tests {
    use eventide_core::serializer::EventSerializer;

    use super::*;

    fn every_event() -> Vec<InventoryEvent> {
        let inventory_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        vec![
            InventoryEvent::Created(InventoryCreated {
                inventory_id,
                owner: "ada".to_owned(),
            }),
            InventoryEvent::ItemAdded(ItemAdded {
                inventory_id,
                item_id,
            }),
            InventoryEvent::ItemRemoved(ItemRemoved {
                inventory_id,
                item_id,
            }),
            InventoryEvent::ItemEquipped(ItemEquipped {
                inventory_id,
                item_id,
            }),
            InventoryEvent::Closed(InventoryClosed { inventory_id }),
        ]
    }

    #[test]
    fn test_every_event_survives_the_registry() {
        let registry = registry();

        for event in every_event() {
            let (event_type, data) = registry.encode(&event).unwrap();
            let decoded = registry.decode(&event_type, &data).unwrap();

            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn test_registry_knows_every_event_type() {
        let registry = registry();

        assert_eq!(
            registry.event_types(),
            vec![
                INVENTORY_CLOSED_EVENT_TYPE,
                INVENTORY_CREATED_EVENT_TYPE,
                ITEM_ADDED_EVENT_TYPE,
                ITEM_EQUIPPED_EVENT_TYPE,
                ITEM_REMOVED_EVENT_TYPE,
            ]
        );
    }

    #[test]
    fn test_payload_is_the_variant_body() {
        let inventory_id = Uuid::nil();
        let event = InventoryEvent::Closed(InventoryClosed { inventory_id });

        let payload: serde_json::Value =
            serde_json::from_slice(&event.to_payload().unwrap()).unwrap();

        assert_eq!(
            payload,
            serde_json::json!({ "inventory_id": inventory_id.to_string() })
        );
    }
}
