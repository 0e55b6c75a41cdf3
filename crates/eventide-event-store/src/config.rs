//! Backend selection from the environment.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use eventide_core::clock::Clock;
use eventide_core::store::EventStore;

use crate::memory::InMemoryEventStore;
use crate::pg_event_store::PgEventStore;

/// Pool size used when `DATABASE_MAX_CONNECTIONS` is unset.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Errors raised while reading configuration or connecting the backend.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `EVENTIDE_STORE` named an unknown backend.
    #[error("unknown store backend: {0} (expected `memory` or `postgres`)")]
    UnknownBackend(String),

    /// A required variable is missing.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// A variable is present but malformed.
    #[error("{name} is invalid: {message}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// The database could not be reached or migrated.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Which `EventStore` implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Process-local store; state is lost on exit.
    #[default]
    Memory,
    /// `PostgreSQL` via `sqlx`.
    Postgres,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::UnknownBackend(other.to_owned())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

/// Resolved backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Selected backend.
    pub backend: BackendKind,
    /// Connection string; required for `Postgres`.
    pub database_url: Option<String>,
    /// Pool size for `Postgres`.
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl StoreConfig {
    /// Reads `EVENTIDE_STORE`, `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`.
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown backend, a missing
    /// `DATABASE_URL` when `postgres` is selected, or a pool size that is
    /// not a positive `u32`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = lookup("EVENTIDE_STORE")
            .map(|value| value.parse::<BackendKind>())
            .transpose()?
            .unwrap_or_default();
        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => parse_max_connections(&raw)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let config = Self {
            backend,
            database_url,
            max_connections,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the selected backend has what it needs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `postgres` has no `DATABASE_URL`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == BackendKind::Postgres && self.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        Ok(())
    }
}

fn parse_max_connections(raw: &str) -> Result<u32, ConfigError> {
    let value: u32 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
        name: "DATABASE_MAX_CONNECTIONS",
        message: format!("must be a valid u32: {e}"),
    })?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name: "DATABASE_MAX_CONNECTIONS",
            message: "must be at least 1".to_owned(),
        });
    }
    Ok(value)
}

/// Builds the configured backend. For `PostgreSQL` this opens the pool and
/// applies the schema.
///
/// # Errors
///
/// Returns `ConfigError` if the configuration is incomplete or the database
/// cannot be reached.
pub async fn connect(
    config: &StoreConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn EventStore>, ConfigError> {
    config.validate()?;
    match config.backend {
        BackendKind::Memory => {
            tracing::info!("using in-memory event store");
            Ok(Arc::new(InMemoryEventStore::with_clock(clock)))
        }
        BackendKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await?;
            let store = PgEventStore::with_clock(pool, clock);
            store.migrate().await?;
            tracing::info!(
                max_connections = config.max_connections,
                "using PostgreSQL event store"
            );
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use eventide_core::clock::SystemClock;
    use eventide_core::stream::ExpectedStreamVersion;
    use eventide_core::store::NewStreamEvent;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_to_memory_backend() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let result = StoreConfig::from_lookup(lookup(&[("EVENTIDE_STORE", "postgres")]));

        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_reads_postgres_settings() {
        // Arrange
        let vars = lookup(&[
            ("EVENTIDE_STORE", "PostgreSQL"),
            ("DATABASE_URL", "postgres://localhost/eventide"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
        ]);

        // Act
        let config = StoreConfig::from_lookup(vars).unwrap();

        // Assert
        assert_eq!(config.backend, BackendKind::Postgres);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/eventide")
        );
        assert_eq!(config.max_connections, 4);
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let result = StoreConfig::from_lookup(lookup(&[("EVENTIDE_STORE", "sqlite")]));

        match result {
            Err(ConfigError::UnknownBackend(name)) => assert_eq!(name, "sqlite"),
            other => panic!("expected UnknownBackend, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_pool_size() {
        let not_a_number =
            StoreConfig::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "lots")]));
        let zero = StoreConfig::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "0")]));

        assert!(matches!(not_a_number, Err(ConfigError::Invalid { .. })));
        assert!(matches!(zero, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_backend_kind_display_round_trips() {
        for kind in [BackendKind::Memory, BackendKind::Postgres] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[tokio::test]
    async fn test_connect_memory_returns_working_store() {
        let store = connect(&StoreConfig::default(), Arc::new(SystemClock))
            .await
            .unwrap();

        store
            .append_event(
                "s",
                NewStreamEvent::new("test.event", b"{}".to_vec()),
                ExpectedStreamVersion::NoStream,
            )
            .await
            .unwrap();

        assert!(store.stream_exists("s").await.unwrap());
    }
}
