//! Event store database schema.
//!
//! Kept in step with `migrations/`; `PgEventStore::migrate` applies it on
//! startup so a fresh database works without running the migrator.

/// Constraint guarding contiguous event numbers within a stream.
pub const STREAM_EVENT_NUMBER_CONSTRAINT: &str = "stream_events_stream_number_key";

/// Constraint guarding event id uniqueness.
pub const EVENT_ID_CONSTRAINT: &str = "stream_events_event_id_key";

/// Advisory lock taken by every append so that global positions are handed
/// out in commit order.
pub const GLOBAL_ORDER_LOCK_KEY: i64 = 0x6576_656e_7469_6465;

/// SQL to create the event store tables.
pub const CREATE_EVENT_STORE_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS event_streams (
    stream_id TEXT PRIMARY KEY,
    version   BIGINT NOT NULL DEFAULT -1
);

CREATE TABLE IF NOT EXISTS stream_events (
    global_position BIGSERIAL PRIMARY KEY,
    event_id        UUID NOT NULL,
    stream_id       TEXT NOT NULL REFERENCES event_streams (stream_id),
    event_number    BIGINT NOT NULL,
    event_type      VARCHAR(255) NOT NULL,
    data            BYTEA NOT NULL,
    metadata        BYTEA,
    recorded_at     TIMESTAMPTZ NOT NULL,
    CONSTRAINT stream_events_event_id_key UNIQUE (event_id),
    CONSTRAINT stream_events_stream_number_key UNIQUE (stream_id, event_number)
);

CREATE INDEX IF NOT EXISTS idx_stream_events_event_type
    ON stream_events (event_type, global_position);
";
