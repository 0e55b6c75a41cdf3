//! JSON rendering of stored events, one document per line.

use std::io::Write;

use chrono::{DateTime, Utc};
use eventide_core::store::StreamEventData;
use serde::Serialize;
use uuid::Uuid;

/// A stored event as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a> {
    pub global_position: i64,
    pub stream_id: &'a str,
    pub event_number: i64,
    pub event_id: Uuid,
    pub event_type: &'a str,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub metadata: Option<serde_json::Value>,
}

/// Payloads written by the JSON registry print as JSON; anything else
/// prints as a (lossy) string.
fn bytes_to_json(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

impl<'a> From<&'a StreamEventData> for EventRecord<'a> {
    fn from(event: &'a StreamEventData) -> Self {
        Self {
            global_position: event.global_position,
            stream_id: &event.stream_id,
            event_number: event.event_number,
            event_id: event.event_id,
            event_type: &event.event_type,
            timestamp: event.timestamp,
            data: bytes_to_json(&event.data),
            metadata: event.metadata.as_deref().map(bytes_to_json),
        }
    }
}

/// Writes each event as a single-line JSON document.
///
/// # Errors
///
/// Returns an I/O error if `out` cannot be written.
pub fn write_events<W: Write>(out: &mut W, events: &[StreamEventData]) -> std::io::Result<()> {
    for event in events {
        serde_json::to_writer(&mut *out, &EventRecord::from(event))?;
        writeln!(out)?;
    }
    Ok(())
}
