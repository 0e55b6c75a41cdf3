//! Eventide Core — the event-sourcing contract.
//!
//! This crate defines append-only event streams, the optimistic concurrency
//! rules every backend enforces, event-sourced aggregates and the store that
//! loads and saves them. It contains no backend code.

pub mod aggregate;
pub mod aggregate_store;
pub mod clock;
pub mod error;
pub mod event;
pub mod projection;
pub mod serializer;
pub mod store;
pub mod stream;
