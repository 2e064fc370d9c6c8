//! NotiSync schema tooling
//!
//! Environment-driven service settings and the versioned PostgreSQL migrations
//! for the `user_rules` table, with a sequential migrator and drift checks.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod migrations;
pub mod models;

pub use config::Settings;
pub use error::{SchemaError, SchemaResult};
pub use models::RuleType;
