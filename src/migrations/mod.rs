//! Schema migrations for the `user_rules` table.
//!
//! This module provides:
//! - Typed DDL changes that mirror the SQL scripts under `migrations/`
//! - The ordered migration catalog and planning between versions
//! - Static validation of the scripts

pub mod catalog;
pub mod change;
pub mod migration;
pub mod sql_check;

pub use catalog::{catalog, find, latest_version, plan, schema_at};
pub use change::SchemaChange;
pub use migration::{Direction, Migration};
