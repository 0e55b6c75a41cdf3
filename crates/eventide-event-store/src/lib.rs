//! Eventide event store backends.
//!
//! - [`memory::InMemoryEventStore`]: the reference implementation, used in
//!   tests and local runs.
//! - [`pg_event_store::PgEventStore`]: durable storage in `PostgreSQL`.
//!
//! [`config`] selects and connects one of them from the environment.

pub mod config;
pub mod memory;
pub mod pg_event_store;
pub mod schema;
