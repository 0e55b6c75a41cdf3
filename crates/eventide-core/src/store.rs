//! The event store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::StreamEventEnvelope;
use crate::serializer::{EventSerializer, decode_stream_event};
use crate::stream::{AppendResult, ExpectedStreamVersion, StreamReadPosition};

/// Stored representation of one event. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventData {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Logical type name for decoder lookup.
    pub event_type: String,
    /// Serialized payload.
    pub data: Vec<u8>,
    /// Serialized side-channel, if any.
    pub metadata: Option<Vec<u8>>,
    /// Owning stream.
    pub stream_id: String,
    /// Zero-based, contiguous position within the stream.
    pub event_number: i64,
    /// Position in the store-wide commit order.
    pub global_position: i64,
    /// Time the store accepted the event.
    pub timestamp: DateTime<Utc>,
}

/// An event to append. The store assigns everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStreamEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Logical type name for decoder lookup.
    pub event_type: String,
    /// Serialized payload.
    pub data: Vec<u8>,
    /// Serialized side-channel, if any.
    pub metadata: Option<Vec<u8>>,
}

impl NewStreamEvent {
    /// Creates an event with a fresh id and no metadata.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: event_type.into(),
            data,
            metadata: None,
        }
    }

    /// Stamps the event with a fully initialised stored form.
    #[must_use]
    pub fn into_stored(
        self,
        stream_id: &str,
        event_number: i64,
        global_position: i64,
        timestamp: DateTime<Utc>,
    ) -> StreamEventData {
        StreamEventData {
            event_id: self.event_id,
            event_type: self.event_type,
            data: self.data,
            metadata: self.metadata,
            stream_id: stream_id.to_owned(),
            event_number,
            global_position,
            timestamp,
        }
    }
}

/// The seam every backend implements.
///
/// Dropping any returned future before it completes leaves the store
/// unchanged: an append is either fully committed or not visible at all.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Returns `true` if the stream has at least one committed event.
    async fn stream_exists(&self, stream_id: &str) -> Result<bool, DomainError>;

    /// Reads forward from `from` (inclusive), returning at most `max_count`
    /// events (`None` for no cap).
    ///
    /// Returns `Ok(None)` if the stream was never created and
    /// `Ok(Some(vec![]))` if it exists but the window is empty.
    async fn read_stream(
        &self,
        stream_id: &str,
        from: StreamReadPosition,
        max_count: Option<usize>,
    ) -> Result<Option<Vec<StreamEventData>>, DomainError>;

    /// Reads the store-wide log in commit order, starting at global
    /// position `from` (inclusive).
    async fn read_all(
        &self,
        from: i64,
        max_count: usize,
    ) -> Result<Vec<StreamEventData>, DomainError>;

    /// Appends `events` atomically after checking `expected`. Events get
    /// contiguous numbers starting at the stream's version + 1.
    ///
    /// # Errors
    ///
    /// `DomainError::ConcurrencyConflict` if the precondition fails, in which
    /// case nothing is written. `DomainError::Validation` for an empty batch.
    async fn append_events(
        &self,
        stream_id: &str,
        events: Vec<NewStreamEvent>,
        expected: ExpectedStreamVersion,
    ) -> Result<AppendResult, DomainError>;

    /// Single-event form of `append_events`.
    async fn append_event(
        &self,
        stream_id: &str,
        event: NewStreamEvent,
        expected: ExpectedStreamVersion,
    ) -> Result<AppendResult, DomainError> {
        self.append_events(stream_id, vec![event], expected).await
    }

    /// Flushes pending writes for backends that batch them. Backends that
    /// are durable on append keep the default no-op.
    async fn commit(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Typed reads over any `EventStore`.
#[async_trait]
pub trait EventStoreExt {
    /// Reads and decodes a window of a stream. `Ok(None)` if the stream was
    /// never created.
    ///
    /// # Errors
    ///
    /// Propagates backend errors and the first `DomainError::Decode`; events
    /// are never skipped.
    async fn get_stream_events<E>(
        &self,
        stream_id: &str,
        from: StreamReadPosition,
        max_count: Option<usize>,
        serializer: &dyn EventSerializer<E>,
    ) -> Result<Option<Vec<StreamEventEnvelope<E>>>, DomainError>
    where
        E: Send + 'static;

    /// Folds a stream from `from` into `seed`. `Ok(None)` if the stream was
    /// never created.
    ///
    /// # Errors
    ///
    /// Propagates backend, decode and fold errors.
    async fn aggregate_stream<T, E, F>(
        &self,
        stream_id: &str,
        from: StreamReadPosition,
        seed: T,
        serializer: &dyn EventSerializer<E>,
        fold: F,
    ) -> Result<Option<T>, DomainError>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnMut(T, StreamEventEnvelope<E>) -> Result<T, DomainError> + Send;
}

#[async_trait]
impl<S> EventStoreExt for S
where
    S: EventStore + ?Sized,
{
    async fn get_stream_events<E>(
        &self,
        stream_id: &str,
        from: StreamReadPosition,
        max_count: Option<usize>,
        serializer: &dyn EventSerializer<E>,
    ) -> Result<Option<Vec<StreamEventEnvelope<E>>>, DomainError>
    where
        E: Send + 'static,
    {
        let Some(stored) = self.read_stream(stream_id, from, max_count).await? else {
            return Ok(None);
        };
        stored
            .into_iter()
            .map(|event| decode_stream_event(serializer, event))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    async fn aggregate_stream<T, E, F>(
        &self,
        stream_id: &str,
        from: StreamReadPosition,
        seed: T,
        serializer: &dyn EventSerializer<E>,
        mut fold: F,
    ) -> Result<Option<T>, DomainError>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnMut(T, StreamEventEnvelope<E>) -> Result<T, DomainError> + Send,
    {
        let Some(stored) = self.read_stream(stream_id, from, None).await? else {
            return Ok(None);
        };
        let mut state = seed;
        for event in stored {
            state = fold(state, decode_stream_event(serializer, event)?)?;
        }
        Ok(Some(state))
    }
}
