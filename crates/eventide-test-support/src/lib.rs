//! Shared test doubles for Eventide.

mod clock;
mod store;

pub use clock::FixedClock;
pub use store::{FailingEventStore, RecordingEventStore, json_event};
