//! In-memory implementation of the `EventStore` trait.
//!
//! Streams live in a map owned by the store instance, next to a single
//! store-wide log in commit order. Global positions are zero-based and
//! gap-free. Event ids are unique across the store. Construct one store per
//! test or process; clones share state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use eventide_core::clock::{Clock, SystemClock};
use eventide_core::error::DomainError;
use eventide_core::store::{EventStore, NewStreamEvent, StreamEventData};
use eventide_core::stream::{
    AppendResult, ExpectedStreamVersion, NO_STREAM_VERSION, StreamReadPosition,
};

/// One stream: its committed version and events, oldest first.
#[derive(Debug)]
struct EventStream {
    stream_id: String,
    version: i64,
    events: Vec<StreamEventData>,
}

impl EventStream {
    fn new(stream_id: &str) -> Self {
        Self {
            stream_id: stream_id.to_owned(),
            version: NO_STREAM_VERSION,
            events: Vec::new(),
        }
    }

    fn check_version(&self, expected: ExpectedStreamVersion) -> Result<(), DomainError> {
        expected.check(&self.stream_id, self.version)
    }

    /// Checks `expected`, then numbers and stores `events`. Nothing changes
    /// if the check fails.
    #[allow(clippy::cast_possible_wrap)]
    fn append_events(
        &mut self,
        expected: ExpectedStreamVersion,
        global_position_base: i64,
        events: Vec<NewStreamEvent>,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<StreamEventData>, DomainError> {
        self.check_version(expected)?;
        let mut stored = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            self.version += 1;
            stored.push(event.into_stored(
                &self.stream_id,
                self.version,
                global_position_base + 1 + offset as i64,
                timestamp,
            ));
        }
        self.events.extend(stored.iter().cloned());
        Ok(stored)
    }

    fn get_events(&self, from: StreamReadPosition, max_count: Option<usize>) -> Vec<StreamEventData> {
        let skip = usize::try_from(from.event_number()).unwrap_or(usize::MAX);
        self.events
            .iter()
            .skip(skip)
            .take(max_count.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<String, EventStream>,
    all: Vec<StreamEventData>,
    event_ids: HashSet<Uuid>,
}

/// Event ids are unique across the whole store, including within a batch.
fn check_unique_ids(
    known: &HashSet<Uuid>,
    stream_id: &str,
    events: &[NewStreamEvent],
) -> Result<(), DomainError> {
    let mut batch = HashSet::with_capacity(events.len());
    for event in events {
        if known.contains(&event.event_id) || !batch.insert(event.event_id) {
            return Err(DomainError::Validation(format!(
                "event {} already exists (stream {stream_id})",
                event.event_id
            )));
        }
    }
    Ok(())
}

/// Thread-safe in-memory event store.
#[derive(Clone)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryEventStore {
    /// Creates an empty store stamping events with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping events with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            clock,
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn stream_exists(&self, stream_id: &str) -> Result<bool, DomainError> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .get(stream_id)
            .is_some_and(|stream| stream.version > NO_STREAM_VERSION))
    }

    #[tracing::instrument(skip(self))]
    async fn read_stream(
        &self,
        stream_id: &str,
        from: StreamReadPosition,
        max_count: Option<usize>,
    ) -> Result<Option<Vec<StreamEventData>>, DomainError> {
        let inner = self.inner.read().await;
        let events = inner
            .streams
            .get(stream_id)
            .map(|stream| stream.get_events(from, max_count));
        tracing::trace!(found = events.as_ref().map(Vec::len), "read stream");
        Ok(events)
    }

    async fn read_all(
        &self,
        from: i64,
        max_count: usize,
    ) -> Result<Vec<StreamEventData>, DomainError> {
        let inner = self.inner.read().await;
        let skip = usize::try_from(from.max(0)).unwrap_or(usize::MAX);
        Ok(inner
            .all
            .iter()
            .skip(skip)
            .take(max_count)
            .cloned()
            .collect())
    }

    #[tracing::instrument(skip(self, events), fields(event_count = events.len()))]
    #[allow(clippy::cast_possible_wrap)]
    async fn append_events(
        &self,
        stream_id: &str,
        events: Vec<NewStreamEvent>,
        expected: ExpectedStreamVersion,
    ) -> Result<AppendResult, DomainError> {
        if events.is_empty() {
            return Err(DomainError::Validation(format!(
                "cannot append an empty batch to stream {stream_id}"
            )));
        }

        let mut inner = self.inner.write().await;
        let Inner {
            streams,
            all,
            event_ids,
        } = &mut *inner;
        check_unique_ids(event_ids, stream_id, &events)?;

        if !streams.contains_key(stream_id) {
            expected.check(stream_id, NO_STREAM_VERSION)?;
        }
        let stream = streams
            .entry(stream_id.to_owned())
            .or_insert_with(|| EventStream::new(stream_id));

        let global_position_base = all.len() as i64 - 1;
        let stored = stream.append_events(expected, global_position_base, events, self.clock.now())?;

        let result = AppendResult {
            global_position: global_position_base + stored.len() as i64,
            next_expected_version: stream.version,
        };
        event_ids.extend(stored.iter().map(|event| event.event_id));
        all.extend(stored);
        drop(inner);

        tracing::debug!(
            version = result.next_expected_version,
            global_position = result.global_position,
            "events committed to stream"
        );
        Ok(result)
    }
}
