//! Command handlers for the inventory context.
//!
//! Each handler runs a full load → decide → save cycle through an
//! `AggregateStore`. When the save loses a race the whole cycle is rerun
//! against freshly loaded state, so business rules are always checked
//! against what is actually committed.

use std::sync::Arc;

use eventide_core::aggregate::AggregateRoot;
use eventide_core::aggregate_store::{AggregateStore, retry_on_conflict};
use eventide_core::error::DomainError;
use eventide_core::store::EventStore;
use uuid::Uuid;

use crate::domain::aggregates::Inventory;
use crate::domain::commands::{AddItem, CloseInventory, CreateInventory, EquipItem, RemoveItem};
use crate::domain::events::registry;

/// How many times a command is rerun after losing a concurrency race.
pub const MAX_CONFLICT_RETRIES: usize = 3;

/// Result of a successfully handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: Uuid,
    /// IDs of the events produced and persisted.
    pub event_ids: Vec<Uuid>,
    /// Stream version after the save.
    pub version: i64,
}

/// Builds the `AggregateStore` the handlers expect, using the inventory
/// event registry.
#[must_use]
pub fn inventory_store(store: Arc<dyn EventStore>) -> AggregateStore<Inventory> {
    AggregateStore::new(store, Arc::new(registry()))
}

async fn load_existing(
    store: &AggregateStore<Inventory>,
    inventory_id: Uuid,
) -> Result<Inventory, DomainError> {
    store
        .load(&inventory_id)
        .await?
        .ok_or_else(|| DomainError::StreamNotFound(Inventory::stream_id(&inventory_id)))
}

async fn persist(
    store: &AggregateStore<Inventory>,
    mut inventory: Inventory,
) -> Result<InventoryCommandResult, DomainError> {
    let event_ids = inventory
        .uncommitted_events()
        .iter()
        .map(|event| event.event_id)
        .collect();
    let version = store
        .save(&mut inventory)
        .await?
        .map_or(inventory.current_version(), |result| {
            result.next_expected_version
        });
    Ok(InventoryCommandResult {
        aggregate_id: *inventory.aggregate_id(),
        event_ids,
        version,
    })
}

/// Handles the `CreateInventory` command.
///
/// # Errors
///
/// Returns `DomainError::BusinessRuleBroken` if the inventory already
/// exists and `DomainError::ConcurrencyConflict` if it was created
/// concurrently.
#[tracing::instrument(skip_all, fields(inventory_id = %command.inventory_id, correlation_id = %command.correlation_id))]
pub async fn handle_create_inventory(
    command: &CreateInventory,
    store: &AggregateStore<Inventory>,
) -> Result<InventoryCommandResult, DomainError> {
    if store.load(&command.inventory_id).await?.is_some() {
        return Err(DomainError::BusinessRuleBroken(format!(
            "inventory {} already exists",
            command.inventory_id
        )));
    }
    let inventory =
        Inventory::create(command.inventory_id, &command.owner, command.correlation_id)?;
    persist(store, inventory).await
}

/// Handles the `AddItem` command: loads the aggregate, adds the item, and
/// persists the resulting events.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` if the inventory was never created,
/// a broken rule, or the last conflict once retries are exhausted.
#[tracing::instrument(skip_all, fields(inventory_id = %command.inventory_id, correlation_id = %command.correlation_id))]
pub async fn handle_add_item(
    command: &AddItem,
    store: &AggregateStore<Inventory>,
) -> Result<InventoryCommandResult, DomainError> {
    retry_on_conflict(MAX_CONFLICT_RETRIES, move || async move {
        let mut inventory = load_existing(store, command.inventory_id).await?;
        inventory.add_item(command.item_id, command.correlation_id)?;
        persist(store, inventory).await
    })
    .await
}

/// Handles the `RemoveItem` command: loads the aggregate, removes the item,
/// and persists the resulting events.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` if the inventory was never created,
/// a broken rule, or the last conflict once retries are exhausted.
#[tracing::instrument(skip_all, fields(inventory_id = %command.inventory_id, correlation_id = %command.correlation_id))]
pub async fn handle_remove_item(
    command: &RemoveItem,
    store: &AggregateStore<Inventory>,
) -> Result<InventoryCommandResult, DomainError> {
    retry_on_conflict(MAX_CONFLICT_RETRIES, move || async move {
        let mut inventory = load_existing(store, command.inventory_id).await?;
        inventory.remove_item(command.item_id, command.correlation_id)?;
        persist(store, inventory).await
    })
    .await
}

/// Handles the `EquipItem` command: loads the aggregate, equips the item,
/// and persists the resulting events.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` if the inventory was never created,
/// a broken rule, or the last conflict once retries are exhausted.
#[tracing::instrument(skip_all, fields(inventory_id = %command.inventory_id, correlation_id = %command.correlation_id))]
pub async fn handle_equip_item(
    command: &EquipItem,
    store: &AggregateStore<Inventory>,
) -> Result<InventoryCommandResult, DomainError> {
    retry_on_conflict(MAX_CONFLICT_RETRIES, move || async move {
        let mut inventory = load_existing(store, command.inventory_id).await?;
        inventory.equip_item(command.item_id, command.correlation_id)?;
        persist(store, inventory).await
    })
    .await
}

/// Handles the `CloseInventory` command.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` if the inventory was never created,
/// `DomainError::BusinessRuleBroken` if it is already closed, or the last
/// conflict once retries are exhausted.
#[tracing::instrument(skip_all, fields(inventory_id = %command.inventory_id, correlation_id = %command.correlation_id))]
pub async fn handle_close_inventory(
    command: &CloseInventory,
    store: &AggregateStore<Inventory>,
) -> Result<InventoryCommandResult, DomainError> {
    retry_on_conflict(MAX_CONFLICT_RETRIES, move || async move {
        let mut inventory = load_existing(store, command.inventory_id).await?;
        inventory.close(command.correlation_id)?;
        persist(store, inventory).await
    })
    .await
}

#[cfg(test)]
mod tests {
    use eventide_core::stream::ExpectedStreamVersion;
    use eventide_test_support::{FailingEventStore, RecordingEventStore, json_event};

    use super::*;
    use crate::domain::events::{INVENTORY_CREATED_EVENT_TYPE, ITEM_ADDED_EVENT_TYPE};

    fn seeded(inventory_id: Uuid, item_id: Option<Uuid>) -> Arc<RecordingEventStore> {
        let mut events = vec![json_event(
            INVENTORY_CREATED_EVENT_TYPE,
            &serde_json::json!({ "inventory_id": inventory_id, "owner": "ada" }),
        )];
        if let Some(item_id) = item_id {
            events.push(json_event(
                ITEM_ADDED_EVENT_TYPE,
                &serde_json::json!({ "inventory_id": inventory_id, "item_id": item_id }),
            ));
        }
        Arc::new(
            RecordingEventStore::new().with_stream(&Inventory::stream_id(&inventory_id), events),
        )
    }

    #[tokio::test]
    async fn test_handle_create_inventory_appends_with_no_stream() {
        // Arrange
        let events = Arc::new(RecordingEventStore::new());
        let store = inventory_store(events.clone());
        let command = CreateInventory {
            correlation_id: Uuid::new_v4(),
            inventory_id: Uuid::new_v4(),
            owner: "ada".to_owned(),
        };

        // Act
        let result = handle_create_inventory(&command, &store).await.unwrap();

        // Assert
        assert_eq!(result.aggregate_id, command.inventory_id);
        assert_eq!(result.event_ids.len(), 1);
        assert_eq!(result.version, 0);

        let appended = events.appended();
        assert_eq!(appended.len(), 1);
        let (stream_id, expected, stored) = &appended[0];
        assert_eq!(stream_id, &Inventory::stream_id(&command.inventory_id));
        assert_eq!(*expected, ExpectedStreamVersion::NoStream);
        assert_eq!(stored[0].event_type, INVENTORY_CREATED_EVENT_TYPE);
        assert_eq!(stored[0].event_id, result.event_ids[0]);
    }

    #[tokio::test]
    async fn test_handle_create_inventory_refuses_existing_inventory() {
        let inventory_id = Uuid::new_v4();
        let events = seeded(inventory_id, None);
        let store = inventory_store(events.clone());
        let command = CreateInventory {
            correlation_id: Uuid::new_v4(),
            inventory_id,
            owner: "bob".to_owned(),
        };

        let result = handle_create_inventory(&command, &store).await;

        assert!(matches!(result, Err(DomainError::BusinessRuleBroken(_))));
        assert!(events.appended().is_empty());
    }

    #[tokio::test]
    async fn test_handle_add_item_appends_at_loaded_version() {
        // Arrange
        let inventory_id = Uuid::new_v4();
        let events = seeded(inventory_id, Some(Uuid::new_v4()));
        let store = inventory_store(events.clone());
        let command = AddItem {
            correlation_id: Uuid::new_v4(),
            inventory_id,
            item_id: Uuid::new_v4(),
        };

        // Act
        let result = handle_add_item(&command, &store).await.unwrap();

        // Assert
        assert_eq!(result.version, 2);
        let appended = events.appended();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].1, ExpectedStreamVersion::Exact(1));
        assert_eq!(appended[0].2[0].event_type, ITEM_ADDED_EVENT_TYPE);
        let metadata: serde_json::Value =
            serde_json::from_slice(appended[0].2[0].metadata.as_ref().unwrap()).unwrap();
        assert_eq!(
            metadata["correlation_id"],
            serde_json::json!(command.correlation_id)
        );
    }

    #[tokio::test]
    async fn test_handle_add_item_returns_not_found_for_unknown_inventory() {
        // Arrange
        let events = Arc::new(RecordingEventStore::new());
        let store = inventory_store(events.clone());
        let inventory_id = Uuid::new_v4();
        let command = AddItem {
            correlation_id: Uuid::new_v4(),
            inventory_id,
            item_id: Uuid::new_v4(),
        };

        // Act
        let result = handle_add_item(&command, &store).await;

        // Assert
        match result {
            Err(DomainError::StreamNotFound(stream_id)) => {
                assert_eq!(stream_id, Inventory::stream_id(&inventory_id));
            }
            other => panic!("expected StreamNotFound, got {other:?}"),
        }
        assert!(events.appended().is_empty());
    }

    #[tokio::test]
    async fn test_handle_remove_item_refuses_missing_item() {
        let inventory_id = Uuid::new_v4();
        let events = seeded(inventory_id, None);
        let store = inventory_store(events.clone());
        let command = RemoveItem {
            correlation_id: Uuid::new_v4(),
            inventory_id,
            item_id: Uuid::new_v4(),
        };

        let result = handle_remove_item(&command, &store).await;

        assert!(matches!(result, Err(DomainError::BusinessRuleBroken(_))));
        assert!(events.appended().is_empty());
    }

    #[tokio::test]
    async fn test_handle_equip_item_persists_event() {
        let inventory_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        let events = seeded(inventory_id, Some(item_id));
        let store = inventory_store(events.clone());
        let command = EquipItem {
            correlation_id: Uuid::new_v4(),
            inventory_id,
            item_id,
        };

        let result = handle_equip_item(&command, &store).await.unwrap();

        assert_eq!(result.event_ids.len(), 1);
        assert_eq!(events.appended()[0].1, ExpectedStreamVersion::Exact(1));
    }

    #[tokio::test]
    async fn test_handle_close_inventory_persists_event() {
        let inventory_id = Uuid::new_v4();
        let events = seeded(inventory_id, None);
        let store = inventory_store(events.clone());
        let command = CloseInventory {
            correlation_id: Uuid::new_v4(),
            inventory_id,
        };

        let result = handle_close_inventory(&command, &store).await.unwrap();

        assert_eq!(result.version, 1);
        assert_eq!(events.appended().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_add_item_propagates_infrastructure_error() {
        let store = inventory_store(Arc::new(FailingEventStore));
        let command = AddItem {
            correlation_id: Uuid::new_v4(),
            inventory_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
        };

        let result = handle_add_item(&command, &store).await;

        match result {
            Err(DomainError::Infrastructure(msg)) => assert_eq!(msg, "connection refused"),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }
}
