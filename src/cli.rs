//! Command line for `notisync-migrate`.

use crate::db::PoolOptions;
use crate::db::pool::{DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "notisync-migrate",
    about = "Apply, revert and verify the NotiSync user_rules schema",
    version,
    long_about = None
)]
pub struct Cli {
    /// PostgreSQL connection URL. Built from DB_* settings when omitted.
    #[arg(long, value_name = "URL", env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Maximum connections in the pool
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "MIGRATE_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS, env = "MIGRATE_ACQUIRE_TIMEOUT")]
    pub acquire_timeout: u64,

    /// Enable JSON logging format (always on when ENVIRONMENT=production)
    #[arg(long, env = "MIGRATE_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Apply pending migrations (default: all)
    Up {
        #[arg(long, value_name = "VERSION")]
        to: Option<u32>,
    },
    /// Revert applied migrations (default: the most recent one)
    Down {
        #[arg(long, value_name = "VERSION")]
        to: Option<u32>,
    },
    /// Show applied and pending migrations as JSON
    Status,
    /// Replay steps between two versions in memory without touching the database
    Plan {
        #[arg(long, value_name = "VERSION", default_value_t = 0)]
        from: u32,
        #[arg(long, value_name = "VERSION")]
        to: Option<u32>,
    },
    /// Print the SQL of one migration
    Sql {
        version: u32,
        /// Print the reverse script instead
        #[arg(long)]
        down: bool,
    },
    /// Check the scripts offline, then compare the live schema with the ledger version
    Verify,
    /// Print the loaded settings with secrets masked
    Config,
}

impl Command {
    /// Whether the command needs a database connection.
    pub fn needs_database(&self) -> bool {
        matches!(
            self,
            Self::Up { .. } | Self::Down { .. } | Self::Status | Self::Verify
        )
    }
}

impl Cli {
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: Some(self.max_connections),
            min_connections: None,
            acquire_timeout_secs: Some(self.acquire_timeout),
        }
    }
}
