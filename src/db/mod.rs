//! Database layer.
//!
//! This module provides:
//! - Connection pool construction
//! - Migration targets (PostgreSQL and in-memory) and the migration ledger
//! - The sequential migrator
//! - Live schema introspection for drift verification

pub mod migrator;
pub mod pool;
pub mod schema;
pub mod target;

pub use migrator::{MigrationStatus, Migrator, PendingMigration, StepOutcome};
pub use pool::{PoolOptions, connect};
pub use schema::{LiveTable, SchemaInspector, compare};
pub use target::{AppliedMigration, LEDGER_TABLE, MemoryTarget, MigrationTarget, PgTarget};
