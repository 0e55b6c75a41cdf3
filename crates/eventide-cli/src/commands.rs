//! Subcommand execution against a connected store.

use std::io::Write;

use eventide_core::error::DomainError;
use eventide_core::store::EventStore;
use eventide_core::stream::StreamReadPosition;

use crate::cli::Command;
use crate::output::write_events;

/// Runs a read-only subcommand, writing JSON lines to `out`.
///
/// # Errors
///
/// Returns `DomainError::StreamNotFound` when `read` names a stream that was
/// never created, store errors, and output failures as
/// `DomainError::Infrastructure`.
pub async fn execute<W: Write>(
    command: &Command,
    store: &dyn EventStore,
    out: &mut W,
) -> Result<(), DomainError> {
    let written = match command {
        Command::Migrate => writeln!(out, "{}", serde_json::json!({ "migrated": true })),
        Command::Exists { stream } => {
            let exists = store.stream_exists(stream).await?;
            writeln!(
                out,
                "{}",
                serde_json::json!({ "stream_id": stream, "exists": exists })
            )
        }
        Command::Read { stream, from, max } => {
            let events = store
                .read_stream(stream, StreamReadPosition::new(*from), *max)
                .await?
                .ok_or_else(|| DomainError::StreamNotFound(stream.clone()))?;
            write_events(out, &events)
        }
        Command::ReadAll { from, max } => {
            let events = store.read_all(*from, *max).await?;
            write_events(out, &events)
        }
    };
    written.map_err(|e| DomainError::Infrastructure(format!("failed to write output: {e}")))
}
