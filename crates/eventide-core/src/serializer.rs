//! Mapping between domain events and their stored form.
//!
//! Decoders are looked up by the stored type name in an explicit registry
//! that is populated at startup, so the set of events a reader understands
//! is a plain, testable list.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;

use crate::error::DomainError;
use crate::event::{DomainEvent, EventMetadata, StreamEventEnvelope, UncommittedEvent};
use crate::store::{NewStreamEvent, StreamEventData};

/// Turns domain events into `(type name, bytes)` and back.
pub trait EventSerializer<E>: Send + Sync {
    /// Encodes `event` into its type name and payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Encode` if the event cannot be stored.
    fn encode(&self, event: &E) -> Result<(String, Vec<u8>), DomainError>;

    /// Decodes a stored payload of type `event_type`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Decode` if the type is unknown or the payload
    /// is malformed.
    fn decode(&self, event_type: &str, data: &[u8]) -> Result<E, DomainError>;
}

type Decoder<E> = Box<dyn Fn(&[u8]) -> Result<E, serde_json::Error> + Send + Sync>;

/// JSON serializer backed by a name → decoder registry.
///
/// Encoding refuses event types that have no decoder, which keeps every
/// stored event readable by the same registry.
pub struct EventRegistry<E> {
    decoders: HashMap<String, Decoder<E>>,
}

impl<E> EventRegistry<E>
where
    E: DomainEvent + 'static,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers `event_type` as a JSON body of type `T`, wrapped into the
    /// aggregate's event enum by `wrap`.
    ///
    /// Registering a superseded type name with a converting `wrap` lets old
    /// streams replay into the current event shape.
    #[must_use]
    pub fn register<T, F>(mut self, event_type: &str, wrap: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> E + Send + Sync + 'static,
    {
        self.decoders.insert(
            event_type.to_owned(),
            Box::new(move |data| serde_json::from_slice::<T>(data).map(&wrap)),
        );
        self
    }

    /// Returns `true` if `event_type` can be decoded.
    #[must_use]
    pub fn is_registered(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// All registered type names, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<E> Default for EventRegistry<E>
where
    E: DomainEvent + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E>
where
    E: DomainEvent + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}

impl<E> EventSerializer<E> for EventRegistry<E>
where
    E: DomainEvent + 'static,
{
    fn encode(&self, event: &E) -> Result<(String, Vec<u8>), DomainError> {
        let event_type = event.event_type();
        if !self.is_registered(event_type) {
            return Err(DomainError::Encode {
                event_type: event_type.to_owned(),
                message: "event type is not registered".to_owned(),
            });
        }
        let payload = event.to_payload().map_err(|e| DomainError::Encode {
            event_type: event_type.to_owned(),
            message: e.to_string(),
        })?;
        Ok((event_type.to_owned(), payload))
    }

    fn decode(&self, event_type: &str, data: &[u8]) -> Result<E, DomainError> {
        let decoder = self
            .decoders
            .get(event_type)
            .ok_or_else(|| DomainError::Decode {
                event_type: event_type.to_owned(),
                message: "unknown event type".to_owned(),
            })?;
        decoder(data).map_err(|e| DomainError::Decode {
            event_type: event_type.to_owned(),
            message: e.to_string(),
        })
    }
}

/// Builds the append request for an uncommitted event.
///
/// # Errors
///
/// Returns `DomainError::Encode` if the payload or metadata cannot be
/// serialized.
pub fn to_new_stream_event<E>(
    serializer: &dyn EventSerializer<E>,
    event: &UncommittedEvent<E>,
) -> Result<NewStreamEvent, DomainError> {
    let (event_type, data) = serializer.encode(&event.payload)?;
    let metadata = serde_json::to_vec(&event.metadata).map_err(|e| DomainError::Encode {
        event_type: event_type.clone(),
        message: format!("metadata: {e}"),
    })?;
    Ok(NewStreamEvent {
        event_id: event.event_id,
        event_type,
        data,
        metadata: Some(metadata),
    })
}

/// Decodes a stored event, including its metadata when present.
///
/// # Errors
///
/// Returns `DomainError::Decode` if the payload or metadata is unreadable.
pub fn decode_stream_event<E>(
    serializer: &dyn EventSerializer<E>,
    stored: StreamEventData,
) -> Result<StreamEventEnvelope<E>, DomainError> {
    let event = serializer.decode(&stored.event_type, &stored.data)?;
    let metadata = stored
        .metadata
        .as_deref()
        .map(serde_json::from_slice::<EventMetadata>)
        .transpose()
        .map_err(|e| DomainError::Decode {
            event_type: stored.event_type.clone(),
            message: format!("metadata: {e}"),
        })?;
    Ok(StreamEventEnvelope {
        event_id: stored.event_id,
        stream_id: stored.stream_id,
        event_number: stored.event_number,
        global_position: stored.global_position,
        timestamp: stored.timestamp,
        metadata,
        event,
    })
}
