//! Data models for notisync schema management.
//!
//! This module re-exports all model types used throughout the crate.

pub mod rule_type;
pub mod schema;

// Re-export commonly used types
pub use rule_type::RuleType;
pub use schema::{CheckConstraint, ColumnDefinition, DatabaseSchema, IndexInfo, TableSchema};
