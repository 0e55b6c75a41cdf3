//! Aggregate roots for the inventory context.

use std::collections::HashSet;

use eventide_core::aggregate::{AggregateChanges, AggregateRoot};
use eventide_core::error::DomainError;
use eventide_core::event::{EventMetadata, UncommittedEvent};
use uuid::Uuid;

use super::events::{
    InventoryClosed, InventoryCreated, InventoryEvent, ItemAdded, ItemEquipped, ItemRemoved,
};
use super::rules::{InventoryMustBeOpen, ItemMustBePresent, ItemMustNotBeEquipped};

/// The aggregate root for an inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    id: Uuid,
    owner: Option<String>,
    open: bool,
    items: HashSet<Uuid>,
    equipped: HashSet<Uuid>,
    changes: AggregateChanges<InventoryEvent>,
}

impl Inventory {
    /// Opens a new inventory for `owner`, producing an `InventoryCreated`
    /// event.
    ///
    /// # Errors
    ///
    /// Propagates a fold failure, which cannot happen for a fresh instance.
    pub fn create(id: Uuid, owner: &str, correlation_id: Uuid) -> Result<Self, DomainError> {
        let mut inventory = <Self as AggregateRoot>::new(id);
        inventory.raise(
            InventoryEvent::Created(InventoryCreated {
                inventory_id: id,
                owner: owner.to_owned(),
            }),
            correlation_id,
        )?;
        Ok(inventory)
    }

    /// Who the inventory belongs to; `None` until created.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Whether the inventory accepts changes.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Items currently held.
    #[must_use]
    pub fn items(&self) -> &HashSet<Uuid> {
        &self.items
    }

    /// Items currently equipped; always a subset of `items`.
    #[must_use]
    pub fn equipped(&self) -> &HashSet<Uuid> {
        &self.equipped
    }

    fn must_be_open(&self) -> Result<(), DomainError> {
        self.check_rule(&InventoryMustBeOpen {
            inventory_id: self.id,
            open: self.open,
        })
    }

    fn must_hold(&self, item_id: Uuid) -> Result<(), DomainError> {
        self.check_rule(&ItemMustBePresent {
            items: &self.items,
            item_id,
        })
    }

    fn raise(&mut self, event: InventoryEvent, correlation_id: Uuid) -> Result<(), DomainError> {
        self.apply_event(UncommittedEvent::new(
            event,
            EventMetadata::caused_by(correlation_id),
        ))
    }

    /// Adds an item to the inventory, producing an `ItemAdded` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRuleBroken` if the inventory is not open.
    pub fn add_item(&mut self, item_id: Uuid, correlation_id: Uuid) -> Result<(), DomainError> {
        self.must_be_open()?;
        self.raise(
            InventoryEvent::ItemAdded(ItemAdded {
                inventory_id: self.id,
                item_id,
            }),
            correlation_id,
        )
    }

    /// Removes an item from the inventory, producing an `ItemRemoved` event.
    /// An equipped item is unequipped as it leaves.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRuleBroken` if the inventory is not open
    /// or the item is not in it.
    pub fn remove_item(&mut self, item_id: Uuid, correlation_id: Uuid) -> Result<(), DomainError> {
        self.must_be_open()?;
        self.must_hold(item_id)?;
        self.raise(
            InventoryEvent::ItemRemoved(ItemRemoved {
                inventory_id: self.id,
                item_id,
            }),
            correlation_id,
        )
    }

    /// Equips an item, producing an `ItemEquipped` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRuleBroken` if the inventory is not
    /// open, the item is not in it, or the item is already equipped.
    pub fn equip_item(&mut self, item_id: Uuid, correlation_id: Uuid) -> Result<(), DomainError> {
        self.must_be_open()?;
        self.must_hold(item_id)?;
        self.check_rule(&ItemMustNotBeEquipped {
            equipped: &self.equipped,
            item_id,
        })?;
        self.raise(
            InventoryEvent::ItemEquipped(ItemEquipped {
                inventory_id: self.id,
                item_id,
            }),
            correlation_id,
        )
    }

    /// Closes the inventory, producing an `InventoryClosed` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRuleBroken` if it is already closed.
    pub fn close(&mut self, correlation_id: Uuid) -> Result<(), DomainError> {
        self.must_be_open()?;
        self.raise(
            InventoryEvent::Closed(InventoryClosed {
                inventory_id: self.id,
            }),
            correlation_id,
        )
    }
}

impl AggregateRoot for Inventory {
    type Id = Uuid;
    type Event = InventoryEvent;
    const AGGREGATE_TYPE: &'static str = "inventory";

    fn new(id: Uuid) -> Self {
        Self {
            id,
            owner: None,
            open: false,
            items: HashSet::new(),
            equipped: HashSet::new(),
            changes: AggregateChanges::new(),
        }
    }

    fn aggregate_id(&self) -> &Uuid {
        &self.id
    }

    fn when(&mut self, event: &InventoryEvent) -> Result<(), DomainError> {
        match event {
            InventoryEvent::Created(payload) => {
                self.owner = Some(payload.owner.clone());
                self.open = true;
            }
            InventoryEvent::ItemAdded(payload) => {
                self.items.insert(payload.item_id);
            }
            InventoryEvent::ItemRemoved(payload) => {
                self.items.remove(&payload.item_id);
                self.equipped.remove(&payload.item_id);
            }
            InventoryEvent::ItemEquipped(payload) => {
                self.equipped.insert(payload.item_id);
            }
            InventoryEvent::Closed(_) => {
                self.open = false;
            }
        }
        Ok(())
    }

    fn changes(&self) -> &AggregateChanges<InventoryEvent> {
        &self.changes
    }

    fn changes_mut(&mut self) -> &mut AggregateChanges<InventoryEvent> {
        &mut self.changes
    }
}
