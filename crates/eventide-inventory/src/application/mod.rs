//! Application services for the inventory context.

pub mod command_handlers;
pub mod projections;
pub mod query_handlers;
