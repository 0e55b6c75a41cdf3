//! Test stores: mock `EventStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventide_core::error::DomainError;
use eventide_core::store::{EventStore, NewStreamEvent, StreamEventData};
use eventide_core::stream::{AppendResult, ExpectedStreamVersion, StreamReadPosition};

/// Builds a `NewStreamEvent` whose payload is `body` as JSON.
///
/// # Panics
///
/// Panics if `body` cannot be serialized, which a `serde_json::Value`
/// always can.
#[must_use]
pub fn json_event(event_type: &str, body: &serde_json::Value) -> NewStreamEvent {
    NewStreamEvent::new(event_type, serde_json::to_vec(body).unwrap())
}

/// An event store that serves pre-seeded history and records every append
/// without enforcing the version precondition.
///
/// Seeded streams read back with positions assigned in seeding order;
/// unknown streams read as never created.
#[derive(Debug, Default)]
pub struct RecordingEventStore {
    history: Mutex<HashMap<String, Vec<StreamEventData>>>,
    appended: Mutex<Vec<(String, ExpectedStreamVersion, Vec<NewStreamEvent>)>>,
}

impl RecordingEventStore {
    /// Creates a store with no streams.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `stream_id` with `events`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_stream(self, stream_id: &str, events: Vec<NewStreamEvent>) -> Self {
        {
            let mut history = self.history.lock().unwrap();
            let base = history.values().map(Vec::len).sum::<usize>();
            let stream = history.entry(stream_id.to_owned()).or_default();
            let first = stream.len();
            for (offset, event) in events.into_iter().enumerate() {
                stream.push(event.into_stored(
                    stream_id,
                    i64::try_from(first + offset).unwrap(),
                    i64::try_from(base + offset).unwrap(),
                    DateTime::<Utc>::default(),
                ));
            }
        }
        self
    }

    /// Returns a snapshot of every `append_events` call, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended(&self) -> Vec<(String, ExpectedStreamVersion, Vec<NewStreamEvent>)> {
        self.appended.lock().unwrap().clone()
    }

    fn version(&self, stream_id: &str) -> i64 {
        let history = self.history.lock().unwrap();
        history
            .get(stream_id)
            .map_or(-1, |events| i64::try_from(events.len()).unwrap() - 1)
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn stream_exists(&self, stream_id: &str) -> Result<bool, DomainError> {
        Ok(self.version(stream_id) >= 0)
    }

    async fn read_stream(
        &self,
        stream_id: &str,
        from: StreamReadPosition,
        max_count: Option<usize>,
    ) -> Result<Option<Vec<StreamEventData>>, DomainError> {
        let history = self.history.lock().unwrap();
        let skip = usize::try_from(from.event_number()).unwrap_or(usize::MAX);
        Ok(history.get(stream_id).map(|events| {
            events
                .iter()
                .skip(skip)
                .take(max_count.unwrap_or(usize::MAX))
                .cloned()
                .collect()
        }))
    }

    async fn read_all(
        &self,
        from: i64,
        max_count: usize,
    ) -> Result<Vec<StreamEventData>, DomainError> {
        let history = self.history.lock().unwrap();
        let mut all: Vec<StreamEventData> = history.values().flatten().cloned().collect();
        all.sort_by_key(|e| e.global_position);
        Ok(all
            .into_iter()
            .filter(|e| e.global_position >= from)
            .take(max_count)
            .collect())
    }

    async fn append_events(
        &self,
        stream_id: &str,
        events: Vec<NewStreamEvent>,
        expected: ExpectedStreamVersion,
    ) -> Result<AppendResult, DomainError> {
        let count = i64::try_from(events.len()).unwrap();
        let next_expected_version = self.version(stream_id) + count;
        self.appended
            .lock()
            .unwrap()
            .push((stream_id.to_owned(), expected, events));
        Ok(AppendResult {
            global_position: next_expected_version,
            next_expected_version,
        })
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

fn connection_refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl EventStore for FailingEventStore {
    async fn stream_exists(&self, _stream_id: &str) -> Result<bool, DomainError> {
        Err(connection_refused())
    }

    async fn read_stream(
        &self,
        _stream_id: &str,
        _from: StreamReadPosition,
        _max_count: Option<usize>,
    ) -> Result<Option<Vec<StreamEventData>>, DomainError> {
        Err(connection_refused())
    }

    async fn read_all(
        &self,
        _from: i64,
        _max_count: usize,
    ) -> Result<Vec<StreamEventData>, DomainError> {
        Err(connection_refused())
    }

    async fn append_events(
        &self,
        _stream_id: &str,
        _events: Vec<NewStreamEvent>,
        _expected: ExpectedStreamVersion,
    ) -> Result<AppendResult, DomainError> {
        Err(connection_refused())
    }
}
