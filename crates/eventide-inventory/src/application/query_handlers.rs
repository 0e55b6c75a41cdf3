//! Query handlers for the inventory context.
//!
//! Queries replay the aggregate's stream and return read-only view DTOs.

use eventide_core::aggregate::AggregateRoot;
use eventide_core::aggregate_store::AggregateStore;
use eventide_core::error::DomainError;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::Inventory;

/// Read-only view of an inventory aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryView {
    /// The inventory identifier.
    pub inventory_id: Uuid,
    /// Who the inventory belongs to.
    pub owner: Option<String>,
    /// Whether the inventory accepts changes.
    pub open: bool,
    /// Items currently in the inventory (sorted for determinism).
    pub items: Vec<Uuid>,
    /// Items currently equipped (sorted for determinism).
    pub equipped: Vec<Uuid>,
    /// Committed stream version.
    pub version: i64,
}

impl From<&Inventory> for InventoryView {
    fn from(inventory: &Inventory) -> Self {
        let mut items: Vec<Uuid> = inventory.items().iter().copied().collect();
        items.sort();
        let mut equipped: Vec<Uuid> = inventory.equipped().iter().copied().collect();
        equipped.sort();
        Self {
            inventory_id: *inventory.aggregate_id(),
            owner: inventory.owner().map(str::to_owned),
            open: inventory.is_open(),
            items,
            equipped,
            version: inventory.current_version(),
        }
    }
}

/// Retrieves an inventory by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` if the inventory was never created,
/// or a decode/infrastructure error from the replay.
pub async fn get_inventory_by_id(
    inventory_id: Uuid,
    store: &AggregateStore<Inventory>,
) -> Result<InventoryView, DomainError> {
    let inventory = store
        .load(&inventory_id)
        .await?
        .ok_or_else(|| DomainError::StreamNotFound(Inventory::stream_id(&inventory_id)))?;
    Ok(InventoryView::from(&inventory))
}
