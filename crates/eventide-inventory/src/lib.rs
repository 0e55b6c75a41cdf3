//! Eventide sample bounded context: inventories of items.
//!
//! Exercises the core end-to-end: an event-sourced aggregate guarded by
//! business rules, command handlers that load and save through an
//! `AggregateStore`, a query handler and a read-model projection.

pub mod application;
pub mod domain;
