//! Business rules guarding inventory changes.

use std::collections::HashSet;

use eventide_core::aggregate::BusinessRule;
use uuid::Uuid;

/// An inventory accepts changes only between creation and closing.
#[derive(Debug)]
pub struct InventoryMustBeOpen {
    /// The inventory identifier.
    pub inventory_id: Uuid,
    /// Whether the inventory is open.
    pub open: bool,
}

impl BusinessRule for InventoryMustBeOpen {
    fn is_broken(&self) -> bool {
        !self.open
    }

    fn message(&self) -> String {
        format!("inventory {} must be open", self.inventory_id)
    }
}

/// The item must currently be held.
#[derive(Debug)]
pub struct ItemMustBePresent<'a> {
    /// Items currently held.
    pub items: &'a HashSet<Uuid>,
    /// The item identifier.
    pub item_id: Uuid,
}

impl BusinessRule for ItemMustBePresent<'_> {
    fn is_broken(&self) -> bool {
        !self.items.contains(&self.item_id)
    }

    fn message(&self) -> String {
        format!("item {} must be present in the inventory", self.item_id)
    }
}

/// An item can be equipped once.
#[derive(Debug)]
pub struct ItemMustNotBeEquipped<'a> {
    /// Items currently equipped.
    pub equipped: &'a HashSet<Uuid>,
    /// The item identifier.
    pub item_id: Uuid,
}

impl BusinessRule for ItemMustNotBeEquipped<'_> {
    fn is_broken(&self) -> bool {
        self.equipped.contains(&self.item_id)
    }

    fn message(&self) -> String {
        format!("item {} must not already be equipped", self.item_id)
    }
}
