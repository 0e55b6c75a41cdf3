//! Loading and saving aggregates through an `EventStore`.
//!
//! `load` folds the aggregate's stream into a fresh instance; `save` appends
//! its uncommitted events guarded by the version it was loaded at. A
//! conflict is returned to the caller untouched: only the caller can decide
//! to reload and rerun the command.

use std::future::Future;
use std::sync::Arc;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::serializer::{EventSerializer, to_new_stream_event};
use crate::store::{EventStore, EventStoreExt, NewStreamEvent};
use crate::stream::{AppendResult, ExpectedStreamVersion, StreamReadPosition};

/// Repository for one aggregate type.
pub struct AggregateStore<A: AggregateRoot> {
    store: Arc<dyn EventStore>,
    serializer: Arc<dyn EventSerializer<A::Event>>,
}

impl<A: AggregateRoot> Clone for AggregateStore<A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            serializer: Arc::clone(&self.serializer),
        }
    }
}

impl<A> AggregateStore<A>
where
    A: AggregateRoot + 'static,
{
    /// Creates a store for `A` over `store`, encoding with `serializer`.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        serializer: Arc<dyn EventSerializer<A::Event>>,
    ) -> Self {
        Self { store, serializer }
    }

    /// The underlying event store.
    #[must_use]
    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Replays the aggregate's stream. Returns `Ok(None)` if the stream was
    /// never created, which is distinct from a loaded aggregate.
    ///
    /// # Errors
    ///
    /// Propagates backend, decode and fold errors.
    #[tracing::instrument(skip(self, id), fields(aggregate_type = A::AGGREGATE_TYPE, id = %id))]
    pub async fn load(&self, id: &A::Id) -> Result<Option<A>, DomainError> {
        let stream_id = A::stream_id(id);
        let loaded = self
            .store
            .aggregate_stream(
                &stream_id,
                StreamReadPosition::START,
                A::new(id.clone()),
                self.serializer.as_ref(),
                |mut aggregate: A, envelope| {
                    aggregate.fold(&envelope.event)?;
                    Ok(aggregate)
                },
            )
            .await?;
        if let Some(aggregate) = &loaded {
            tracing::trace!(version = aggregate.current_version(), "aggregate loaded");
        }
        Ok(loaded)
    }

    /// Appends the aggregate's uncommitted events, expecting the stream to
    /// still be at the aggregate's original version. Returns `Ok(None)` when
    /// there was nothing to save.
    ///
    /// The queue is only cleared once the append succeeds.
    ///
    /// # Errors
    ///
    /// `DomainError::ConcurrencyConflict` if another writer got there first;
    /// the aggregate keeps its uncommitted events in that case.
    #[tracing::instrument(skip(self, aggregate), fields(aggregate_type = A::AGGREGATE_TYPE))]
    pub async fn save(&self, aggregate: &mut A) -> Result<Option<AppendResult>, DomainError> {
        if aggregate.uncommitted_events().is_empty() {
            return Ok(None);
        }
        let stream_id = A::stream_id(aggregate.aggregate_id());
        let events = aggregate
            .uncommitted_events()
            .iter()
            .map(|event| to_new_stream_event(self.serializer.as_ref(), event))
            .collect::<Result<Vec<NewStreamEvent>, _>>()?;
        let expected = ExpectedStreamVersion::from_version(aggregate.original_version());

        let result = match self.store.append_events(&stream_id, events, expected).await {
            Ok(result) => result,
            Err(err) => {
                if err.is_concurrency_conflict() {
                    tracing::warn!(%stream_id, %expected, "aggregate save rejected: {err}");
                }
                return Err(err);
            }
        };

        aggregate.mark_uncommitted_as_committed();
        tracing::debug!(
            %stream_id,
            version = result.next_expected_version,
            global_position = result.global_position,
            "aggregate saved"
        );
        Ok(Some(result))
    }
}

/// Runs `op` (a complete load → decide → save cycle) again whenever it
/// fails with `DomainError::ConcurrencyConflict`, up to `max_retries` extra
/// attempts. Any other error is returned immediately.
///
/// # Errors
///
/// Returns the last conflict once retries are exhausted, or the first
/// non-conflict error.
pub async fn retry_on_conflict<T, F, Fut>(max_retries: usize, mut op: F) -> Result<T, DomainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_concurrency_conflict() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(attempt, "retrying after concurrency conflict: {err}");
            }
            other => return other,
        }
    }
}
