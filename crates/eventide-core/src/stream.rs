//! Stream versions, read cursors and append results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Version of a stream that has no committed events.
pub const NO_STREAM_VERSION: i64 = -1;

/// Append-time precondition on a stream's current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedStreamVersion {
    /// The stream must not have any committed events yet.
    NoStream,
    /// Skip the version check.
    Any,
    /// The stream must currently be at exactly this version.
    Exact(i64),
}

impl ExpectedStreamVersion {
    /// Maps a version as tracked by an aggregate (`-1` for a new one) to the
    /// precondition that guards its next write.
    #[must_use]
    pub fn from_version(version: i64) -> Self {
        if version < 0 {
            Self::NoStream
        } else {
            Self::Exact(version)
        }
    }

    /// Checks `actual` (the stream's committed version, `-1` when it has no
    /// events) against this precondition.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` carrying both versions when
    /// the precondition does not hold.
    pub fn check(self, stream_id: &str, actual: i64) -> Result<(), DomainError> {
        let satisfied = match self {
            Self::NoStream => actual == NO_STREAM_VERSION,
            Self::Any => true,
            Self::Exact(expected) => actual == expected,
        };
        if satisfied {
            Ok(())
        } else {
            Err(DomainError::ConcurrencyConflict {
                stream_id: stream_id.to_owned(),
                expected: self,
                actual,
            })
        }
    }
}

impl fmt::Display for ExpectedStreamVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStream => f.write_str("no stream"),
            Self::Any => f.write_str("any version"),
            Self::Exact(version) => write!(f, "version {version}"),
        }
    }
}

/// Stream-relative read cursor: the first event number to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamReadPosition(u64);

impl StreamReadPosition {
    /// Read from the first event of the stream.
    pub const START: Self = Self(0);

    /// Creates a cursor at `event_number`.
    #[must_use]
    pub const fn new(event_number: u64) -> Self {
        Self(event_number)
    }

    /// The event number this cursor points at.
    #[must_use]
    pub const fn event_number(self) -> u64 {
        self.0
    }
}

impl From<u64> for StreamReadPosition {
    fn from(event_number: u64) -> Self {
        Self(event_number)
    }
}

/// Returned by every successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendResult {
    /// Store-wide position of the last event written by the append.
    pub global_position: i64,
    /// The stream's new version; pass it as `ExpectedStreamVersion::Exact`
    /// on the next write.
    pub next_expected_version: i64,
}
