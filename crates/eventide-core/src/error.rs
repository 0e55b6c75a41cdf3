//! Error types shared by every event store backend and aggregate.

use thiserror::Error;

use crate::stream::ExpectedStreamVersion;

/// Top-level error type for the event-sourcing core.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A caller required a stream that was never created.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// Optimistic concurrency conflict. Reload the aggregate and reapply the
    /// command; resending the same events will fail again.
    #[error("concurrency conflict on stream {stream_id}: expected {expected}, found version {actual}")]
    ConcurrencyConflict {
        /// The stream that had the conflict.
        stream_id: String,
        /// The precondition supplied by the writer.
        expected: ExpectedStreamVersion,
        /// The version the stream was actually at (`-1` when absent).
        actual: i64,
    },

    /// A stored event could not be turned back into a domain event.
    #[error("failed to decode event of type {event_type}: {message}")]
    Decode {
        /// The stored type name.
        event_type: String,
        /// What went wrong.
        message: String,
    },

    /// A domain event could not be turned into its stored form.
    #[error("failed to encode event of type {event_type}: {message}")]
    Encode {
        /// The logical type name of the event.
        event_type: String,
        /// What went wrong.
        message: String,
    },

    /// An aggregate was asked to fold an event it has no handler for.
    #[error("aggregate {aggregate_type} has no fold handler for event {event_type}")]
    FoldHandlerMissing {
        /// The aggregate type doing the replay.
        aggregate_type: &'static str,
        /// The event type it could not handle.
        event_type: String,
    },

    /// A business rule guarding a state change was broken.
    #[error("business rule broken: {0}")]
    BusinessRuleBroken(String),

    /// A malformed request to the store.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for the one failure a command handler may recover
    /// from by reloading and retrying.
    #[must_use]
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
