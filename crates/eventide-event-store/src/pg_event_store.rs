//! `PostgreSQL` implementation of the `EventStore` trait.
//!
//! Appends run in a single transaction. The stream's row in
//! `event_streams` is locked with `FOR UPDATE`, which serializes writers to
//! the same stream while leaving other streams independent. The
//! `UNIQUE (stream_id, event_number)` constraint backs the check up.
//! Dropping an append future before it commits rolls the transaction back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use eventide_core::clock::{Clock, SystemClock};
use eventide_core::error::DomainError;
use eventide_core::store::{EventStore, NewStreamEvent, StreamEventData};
use eventide_core::stream::{
    AppendResult, ExpectedStreamVersion, NO_STREAM_VERSION, StreamReadPosition,
};

use crate::schema::{
    CREATE_EVENT_STORE_SCHEMA, EVENT_ID_CONSTRAINT, GLOBAL_ORDER_LOCK_KEY,
    STREAM_EVENT_NUMBER_CONSTRAINT,
};

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    global_position: i64,
    event_id: Uuid,
    stream_id: String,
    event_number: i64,
    event_type: String,
    data: Vec<u8>,
    metadata: Option<Vec<u8>>,
    recorded_at: DateTime<Utc>,
}

impl From<EventRow> for StreamEventData {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            event_type: row.event_type,
            data: row.data,
            metadata: row.metadata,
            stream_id: row.stream_id,
            event_number: row.event_number,
            global_position: row.global_position,
            timestamp: row.recorded_at,
        }
    }
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {err}"))
}

/// PostgreSQL-backed event store.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PgEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgEventStore")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl PgEventStore {
    /// Creates a new `PgEventStore` stamping events with the system clock.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Creates a new `PgEventStore` stamping events with `clock`.
    #[must_use]
    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Applies the schema. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a `sqlx::Error` if any DDL statement fails.
    #[tracing::instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(CREATE_EVENT_STORE_SCHEMA)
            .execute(&self.pool)
            .await?;
        tracing::info!("event store schema applied");
        Ok(())
    }

    async fn committed_version(&self, stream_id: &str) -> Result<i64, DomainError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM event_streams WHERE stream_id = $1")
                .bind(stream_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(infrastructure)?;
        Ok(version.unwrap_or(NO_STREAM_VERSION))
    }
}

/// Maps an insert failure. A duplicate `(stream_id, event_number)` means a
/// concurrent writer won despite the row lock; report it as a conflict.
fn map_insert_error(
    err: sqlx::Error,
    stream_id: &str,
    expected: ExpectedStreamVersion,
    actual: i64,
) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(STREAM_EVENT_NUMBER_CONSTRAINT) => {
                    return DomainError::ConcurrencyConflict {
                        stream_id: stream_id.to_owned(),
                        expected,
                        actual,
                    };
                }
                Some(EVENT_ID_CONSTRAINT) => {
                    return DomainError::Validation(format!(
                        "event id already stored (stream {stream_id})"
                    ));
                }
                _ => {}
            }
        }
    }
    infrastructure(err)
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn stream_exists(&self, stream_id: &str) -> Result<bool, DomainError> {
        Ok(self.committed_version(stream_id).await? > NO_STREAM_VERSION)
    }

    #[tracing::instrument(skip(self))]
    async fn read_stream(
        &self,
        stream_id: &str,
        from: StreamReadPosition,
        max_count: Option<usize>,
    ) -> Result<Option<Vec<StreamEventData>>, DomainError> {
        let from = i64::try_from(from.event_number()).unwrap_or(i64::MAX);
        let limit = max_count.map(|n| i64::try_from(n).unwrap_or(i64::MAX));
        let rows: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT global_position, event_id, stream_id, event_number, event_type,
                   data, metadata, recorded_at
            FROM stream_events
            WHERE stream_id = $1 AND event_number >= $2
            ORDER BY event_number
            LIMIT $3
            ",
        )
        .bind(stream_id)
        .bind(from)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        if rows.is_empty() && !self.stream_exists(stream_id).await? {
            return Ok(None);
        }
        tracing::trace!(found = rows.len(), "read stream");
        Ok(Some(rows.into_iter().map(StreamEventData::from).collect()))
    }

    async fn read_all(
        &self,
        from: i64,
        max_count: usize,
    ) -> Result<Vec<StreamEventData>, DomainError> {
        let limit = i64::try_from(max_count).unwrap_or(i64::MAX);
        let rows: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT global_position, event_id, stream_id, event_number, event_type,
                   data, metadata, recorded_at
            FROM stream_events
            WHERE global_position >= $1
            ORDER BY global_position
            LIMIT $2
            ",
        )
        .bind(from)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(rows.into_iter().map(StreamEventData::from).collect())
    }

    #[tracing::instrument(skip(self, events), fields(event_count = events.len()))]
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
        let count = i64::try_from(events.len())
            .map_err(|_| DomainError::Validation("batch too large".to_owned()))?;

        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        sqlx::query(
            "INSERT INTO event_streams (stream_id, version) VALUES ($1, -1) ON CONFLICT (stream_id) DO NOTHING",
        )
        .bind(stream_id)
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?;

        let actual: i64 =
            sqlx::query_scalar("SELECT version FROM event_streams WHERE stream_id = $1 FOR UPDATE")
                .bind(stream_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(infrastructure)?;

        if let Err(err) = expected.check(stream_id, actual) {
            tracing::debug!(actual, %expected, "append rejected");
            return Err(err);
        }

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(GLOBAL_ORDER_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(infrastructure)?;

        let recorded_at = self.clock.now();
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO stream_events (event_id, stream_id, event_number, event_type, data, metadata, recorded_at) ",
        );
        qb.push_values(
            events.into_iter().zip(actual + 1..),
            |mut b, (event, event_number)| {
                b.push_bind(event.event_id)
                    .push_bind(stream_id)
                    .push_bind(event_number)
                    .push_bind(event.event_type)
                    .push_bind(event.data)
                    .push_bind(event.metadata)
                    .push_bind(recorded_at);
            },
        );
        qb.push(" RETURNING global_position");

        let positions: Vec<i64> = qb
            .build_query_scalar()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_insert_error(e, stream_id, expected, actual))?;
        let global_position = positions.last().copied().ok_or_else(|| {
            DomainError::Infrastructure("database did not return an inserted position".to_owned())
        })?;

        let next_expected_version = actual + count;
        sqlx::query("UPDATE event_streams SET version = $1 WHERE stream_id = $2")
            .bind(next_expected_version)
            .bind(stream_id)
            .execute(&mut *tx)
            .await
            .map_err(infrastructure)?;

        tx.commit().await.map_err(infrastructure)?;

        tracing::debug!(
            version = next_expected_version,
            global_position,
            "events committed to stream"
        );
        Ok(AppendResult {
            global_position,
            next_expected_version,
        })
    }
}
