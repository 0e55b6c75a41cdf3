//! Clock abstraction used to stamp appended events.

use chrono::{DateTime, Utc};

/// Source of append timestamps. Backends take one so that stored events are
/// deterministic under test.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
