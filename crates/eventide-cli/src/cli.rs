//! Command-line arguments.

use clap::{Parser, Subcommand};

/// Inspect and maintain an Eventide event store.
#[derive(Debug, Parser)]
#[command(name = "eventide", version, about, long_about = None)]
pub struct Cli {
    /// Backend to use (`memory` or `postgres`); overrides `EVENTIDE_STORE`.
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Connection string; overrides `DATABASE_URL`.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Apply the event store schema.
    Migrate,

    /// Report whether a stream has any events.
    Exists {
        /// Stream identifier.
        stream: String,
    },

    /// Print a stream's events, oldest first.
    Read {
        /// Stream identifier.
        stream: String,

        /// First event number to print.
        #[arg(long, default_value_t = 0)]
        from: u64,

        /// Maximum number of events to print.
        #[arg(long)]
        max: Option<usize>,
    },

    /// Print the store-wide log in commit order.
    ReadAll {
        /// First global position to print.
        #[arg(long, default_value_t = 0)]
        from: i64,

        /// Maximum number of events to print.
        #[arg(long, default_value_t = 100)]
        max: usize,
    },
}

impl Cli {
    /// Looks a configuration variable up, preferring command-line flags over
    /// the environment.
    pub fn lookup(&self, name: &str) -> Option<String> {
        let flag = match name {
            "EVENTIDE_STORE" => self.store.clone(),
            "DATABASE_URL" => self.database_url.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_read_with_window() {
        let cli = Cli::try_parse_from([
            "eventide", "read", "inventory-1", "--from", "5", "--max", "3",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Read {
                stream: "inventory-1".to_owned(),
                from: 5,
                max: Some(3),
            }
        );
    }

    #[test]
    fn test_parses_read_all_defaults() {
        let cli = Cli::try_parse_from(["eventide", "read-all"]).unwrap();

        assert_eq!(cli.command, Command::ReadAll { from: 0, max: 100 });
    }

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::try_parse_from([
            "eventide",
            "--store",
            "postgres",
            "--database-url",
            "postgres://localhost/eventide",
            "migrate",
        ])
        .unwrap();

        assert_eq!(cli.lookup("EVENTIDE_STORE").as_deref(), Some("postgres"));
        assert_eq!(
            cli.lookup("DATABASE_URL").as_deref(),
            Some("postgres://localhost/eventide")
        );
    }
}
