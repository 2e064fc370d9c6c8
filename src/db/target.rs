//! Where migrations are applied.
//!
//! [`PgTarget`] executes the embedded SQL against PostgreSQL and keeps the
//! `schema_migrations` ledger in the same transaction as each step.
//! [`MemoryTarget`] replays the typed changes against an in-memory schema;
//! it backs dry runs and tests.

use crate::db::pool::pool_error;
use crate::error::{SchemaError, SchemaResult};
use crate::migrations::{Direction, Migration};
use crate::models::DatabaseSchema;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tracing::debug;

pub const LEDGER_TABLE: &str = "schema_migrations";

mod queries {
    pub const CREATE_LEDGER: &str = r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#;

    pub const LIST_APPLIED: &str =
        "SELECT version, name, applied_at FROM schema_migrations ORDER BY version";

    pub const RECORD: &str = "INSERT INTO schema_migrations (version, name) VALUES ($1, $2)";

    pub const FORGET: &str = "DELETE FROM schema_migrations WHERE version = $1";
}

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: u32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// A database (real or simulated) that migrations can be applied to.
#[allow(async_fn_in_trait)]
pub trait MigrationTarget {
    /// Create the ledger if it does not exist yet.
    async fn ensure_ledger(&mut self) -> SchemaResult<()>;

    /// Ledger rows ordered by version.
    async fn applied(&mut self) -> SchemaResult<Vec<AppliedMigration>>;

    /// Run one migration step and update the ledger atomically.
    async fn apply(&mut self, migration: &Migration, direction: Direction) -> SchemaResult<()>;
}

#[derive(Debug, Clone)]
pub struct PgTarget {
    pool: PgPool,
}

impl PgTarget {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl MigrationTarget for PgTarget {
    async fn ensure_ledger(&mut self) -> SchemaResult<()> {
        sqlx::raw_sql(queries::CREATE_LEDGER)
            .execute(&self.pool)
            .await
            .map_err(|e| pool_error(&self.pool, e))?;
        Ok(())
    }

    async fn applied(&mut self) -> SchemaResult<Vec<AppliedMigration>> {
        let rows = sqlx::query_as::<_, (i64, String, DateTime<Utc>)>(queries::LIST_APPLIED)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| pool_error(&self.pool, e))?;

        rows.into_iter()
            .map(|(version, name, applied_at)| {
                let version = u32::try_from(version).map_err(|_| {
                    SchemaError::drift(format!("Ledger holds out-of-range version {}", version))
                })?;
                Ok(AppliedMigration {
                    version,
                    name,
                    applied_at,
                })
            })
            .collect()
    }

    async fn apply(&mut self, migration: &Migration, direction: Direction) -> SchemaResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| pool_error(&self.pool, e))?;

        sqlx::raw_sql(migration.sql(direction))
            .execute(&mut *tx)
            .await?;

        let version = i64::from(migration.version);
        match direction {
            Direction::Up => {
                sqlx::query(queries::RECORD)
                    .bind(version)
                    .bind(migration.name)
                    .execute(&mut *tx)
                    .await?;
            }
            Direction::Down => {
                sqlx::query(queries::FORGET)
                    .bind(version)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        debug!(version = migration.version, %direction, "Committed migration step");
        Ok(())
    }
}

/// In-memory database: a schema plus a ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    schema: DatabaseSchema,
    ledger: Option<BTreeMap<u32, AppliedMigration>>,
}

impl MemoryTarget {
    /// Empty database without a ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Database already holding `schema` with `versions` recorded as applied.
    pub fn with_state(schema: DatabaseSchema, versions: &[(u32, &str)]) -> Self {
        let ledger = versions
            .iter()
            .map(|(version, name)| {
                (
                    *version,
                    AppliedMigration {
                        version: *version,
                        name: name.to_string(),
                        applied_at: Utc::now(),
                    },
                )
            })
            .collect();
        Self {
            schema,
            ledger: Some(ledger),
        }
    }

    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    pub fn has_ledger(&self) -> bool {
        self.ledger.is_some()
    }

    fn ledger_mut(&mut self) -> SchemaResult<&mut BTreeMap<u32, AppliedMigration>> {
        self.ledger
            .as_mut()
            .ok_or_else(|| SchemaError::schema("Table does not exist", LEDGER_TABLE))
    }
}

impl MigrationTarget for MemoryTarget {
    async fn ensure_ledger(&mut self) -> SchemaResult<()> {
        self.ledger.get_or_insert_with(BTreeMap::new);
        Ok(())
    }

    async fn applied(&mut self) -> SchemaResult<Vec<AppliedMigration>> {
        Ok(self.ledger_mut()?.values().cloned().collect())
    }

    async fn apply(&mut self, migration: &Migration, direction: Direction) -> SchemaResult<()> {
        // Stage on a copy so a failing step leaves schema and ledger untouched.
        let mut schema = self.schema.clone();
        migration.apply_to(&mut schema, direction)?;

        let ledger = self.ledger_mut()?;
        match direction {
            Direction::Up => {
                if ledger.contains_key(&migration.version) {
                    return Err(SchemaError::database(
                        format!("duplicate key value violates unique constraint on version {}", migration.version),
                        Some("23505".to_string()),
                        "The ledger already records this version",
                    ));
                }
                ledger.insert(
                    migration.version,
                    AppliedMigration {
                        version: migration.version,
                        name: migration.name.to_string(),
                        applied_at: Utc::now(),
                    },
                );
            }
            Direction::Down => {
                ledger.remove(&migration.version);
            }
        }

        self.schema = schema;
        Ok(())
    }
}
