//! Read projections fed from the store-wide log.
//!
//! A `ProjectionRunner` pages through `EventStore::read_all` from each
//! projection's checkpoint and hands events over in commit order. The
//! checkpoint moves after every successful delivery.
//!
//! Delivery is at-least-once, not at-most-once: an event is handed over
//! again when `project` failed on it or when saving the checkpoint after it
//! failed. Projections must therefore apply events idempotently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};

use crate::error::DomainError;
use crate::store::{EventStore, StreamEventData};

/// A denormalized view built from committed events.
#[async_trait]
pub trait ReadProjection: Send + Sync {
    /// Stable name, used as the checkpoint key.
    fn name(&self) -> &str;

    /// Applies one committed event.
    async fn project(&self, event: &StreamEventData) -> Result<(), DomainError>;
}

/// Persists the last global position delivered to each projection.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the last delivered position, if any.
    async fn load(&self, projection: &str) -> Result<Option<i64>, DomainError>;

    /// Records `position` as delivered.
    async fn save(&self, projection: &str, position: i64) -> Result<(), DomainError>;
}

/// Process-local checkpoints.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    positions: RwLock<HashMap<String, i64>>,
}

impl InMemoryCheckpointStore {
    /// Creates an empty checkpoint store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, projection: &str) -> Result<Option<i64>, DomainError> {
        Ok(self.positions.read().await.get(projection).copied())
    }

    async fn save(&self, projection: &str, position: i64) -> Result<(), DomainError> {
        self.positions
            .write()
            .await
            .insert(projection.to_owned(), position);
        Ok(())
    }
}

/// Delivers the global log to a set of projections.
pub struct ProjectionRunner {
    store: Arc<dyn EventStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    projections: Vec<Arc<dyn ReadProjection>>,
    batch_size: usize,
}

impl ProjectionRunner {
    /// Default number of events fetched per `read_all` call.
    pub const DEFAULT_BATCH_SIZE: usize = 256;

    /// Creates a runner with no projections.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            checkpoints,
            projections: Vec::new(),
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    /// Adds a projection.
    #[must_use]
    pub fn with_projection(mut self, projection: Arc<dyn ReadProjection>) -> Self {
        self.projections.push(projection);
        self
    }

    /// Sets the page size used when reading the log.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Delivers everything committed since each projection's checkpoint and
    /// returns the number of events delivered.
    ///
    /// # Errors
    ///
    /// Stops at the first read, projection or checkpoint failure.
    pub async fn catch_up(&self) -> Result<usize, DomainError> {
        let mut delivered = 0;
        for projection in &self.projections {
            delivered += self.catch_up_one(projection.as_ref()).await?;
        }
        Ok(delivered)
    }

    #[tracing::instrument(skip(self, projection), fields(projection = projection.name()))]
    async fn catch_up_one(&self, projection: &dyn ReadProjection) -> Result<usize, DomainError> {
        let mut from = self
            .checkpoints
            .load(projection.name())
            .await?
            .map_or(0, |position| position + 1);
        let mut delivered = 0;
        loop {
            let batch = self.store.read_all(from, self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            for event in &batch {
                projection.project(event).await?;
                self.checkpoints
                    .save(projection.name(), event.global_position)
                    .await?;
                from = event.global_position + 1;
                delivered += 1;
            }
        }
        if delivered > 0 {
            tracing::debug!(delivered, next_position = from, "projection caught up");
        }
        Ok(delivered)
    }

    /// Calls `catch_up` every `poll_interval` until `shutdown` changes or its
    /// sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns the first `catch_up` failure.
    pub async fn run(
        &self,
        poll_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), DomainError> {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.catch_up().await?;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("projection runner stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}
