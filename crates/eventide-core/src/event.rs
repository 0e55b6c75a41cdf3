//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Side-channel stored next to every event written through an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the event/command that caused it.
    pub causation_id: Uuid,
}

impl EventMetadata {
    /// Metadata for an event caused directly by the command `correlation_id`.
    #[must_use]
    pub fn caused_by(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            causation_id: correlation_id,
        }
    }
}

/// Trait implemented by each aggregate's closed set of events.
pub trait DomainEvent: Send + Sync + Clone + std::fmt::Debug {
    /// Logical type name, used to pick a decoder when reading back.
    fn event_type(&self) -> &'static str;

    /// Serializes the variant body.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if the payload cannot be encoded.
    fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error>;
}

/// An event produced in the current session and not yet appended.
#[derive(Debug, Clone, PartialEq)]
pub struct UncommittedEvent<E> {
    /// Identity used to deduplicate the uncommitted queue; becomes the
    /// stored event id.
    pub event_id: Uuid,
    /// Correlation/causation data.
    pub metadata: EventMetadata,
    /// The domain event itself.
    pub payload: E,
}

impl<E> UncommittedEvent<E> {
    /// Wraps `payload` with a fresh event id.
    #[must_use]
    pub fn new(payload: E, metadata: EventMetadata) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            metadata,
            payload,
        }
    }
}

/// A stored event decoded back into its domain type.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEventEnvelope<E> {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Owning stream.
    pub stream_id: String,
    /// Zero-based position within the stream.
    pub event_number: i64,
    /// Position in the store-wide commit order.
    pub global_position: i64,
    /// When the store accepted the event.
    pub timestamp: DateTime<Utc>,
    /// Decoded side-channel, if one was stored.
    pub metadata: Option<EventMetadata>,
    /// The decoded domain event.
    pub event: E,
}
