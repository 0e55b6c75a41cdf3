//! Domain model for the inventory context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod rules;
