//! Sequential migration runner.

use crate::db::target::{AppliedMigration, MigrationTarget};
use crate::error::{SchemaError, SchemaResult};
use crate::migrations::{self, Direction};
use serde::Serialize;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMigration {
    pub version: u32,
    pub name: String,
}

/// Ledger state compared with the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub current_version: u32,
    pub latest_version: u32,
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<PendingMigration>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// A step that was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub version: u32,
    pub name: String,
    pub direction: Direction,
    /// One summary line per schema change, in execution order.
    pub changes: Vec<String>,
}

pub struct Migrator<T> {
    target: T,
}

impl<T: MigrationTarget> Migrator<T> {
    pub fn new(target: T) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }

    /// Read the ledger and check it against the catalog.
    ///
    /// The ledger must hold exactly versions `1..=n` with their catalog names.
    pub async fn status(&mut self) -> SchemaResult<MigrationStatus> {
        self.target.ensure_ledger().await?;
        let applied = self.target.applied().await?;

        for (i, row) in applied.iter().enumerate() {
            let Some(known) = migrations::find(row.version) else {
                return Err(SchemaError::drift(format!(
                    "Ledger records version {} ({}) which is not in the catalog",
                    row.version, row.name
                )));
            };
            if known.name != row.name {
                return Err(SchemaError::drift(format!(
                    "Ledger names version {} '{}' but the catalog has '{}'",
                    row.version, row.name, known.name
                )));
            }
            let expected = u32::try_from(i + 1).unwrap_or(u32::MAX);
            if row.version != expected {
                return Err(SchemaError::drift(format!(
                    "Ledger has a gap: version {} is applied but {} is not",
                    row.version, expected
                )));
            }
        }

        let current_version = applied.last().map(|m| m.version).unwrap_or(0);
        let pending = migrations::catalog()
            .iter()
            .filter(|m| m.version > current_version)
            .map(|m| PendingMigration {
                version: m.version,
                name: m.name.to_string(),
            })
            .collect();

        Ok(MigrationStatus {
            current_version,
            latest_version: migrations::latest_version(),
            applied,
            pending,
        })
    }

    pub async fn current_version(&mut self) -> SchemaResult<u32> {
        Ok(self.status().await?.current_version)
    }

    /// Apply pending migrations up to `target` (default: latest).
    pub async fn up(&mut self, target: Option<u32>) -> SchemaResult<Vec<StepOutcome>> {
        let current = self.current_version().await?;
        let target = target.unwrap_or_else(migrations::latest_version);
        if target < current {
            return Err(SchemaError::invalid_input(format!(
                "Target version {} is below the current version {}; use down instead",
                target, current
            )));
        }
        self.run(current, target).await
    }

    /// Revert applied migrations down to `target` (default: one step).
    pub async fn down(&mut self, target: Option<u32>) -> SchemaResult<Vec<StepOutcome>> {
        let current = self.current_version().await?;
        let target = target.unwrap_or(current.saturating_sub(1));
        if target > current {
            return Err(SchemaError::invalid_input(format!(
                "Target version {} is above the current version {}; use up instead",
                target, current
            )));
        }
        self.run(current, target).await
    }

    async fn run(&mut self, current: u32, target: u32) -> SchemaResult<Vec<StepOutcome>> {
        let steps = migrations::plan(current, target)?;
        if steps.is_empty() {
            info!(version = current, "Schema already at requested version");
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::with_capacity(steps.len());
        for (migration, direction) in steps {
            info!(
                version = migration.version,
                name = migration.name,
                %direction,
                "Applying migration"
            );
            let changes: Vec<String> = migration
                .changes(direction)
                .iter()
                .map(|c| c.describe())
                .collect();
            for change in &changes {
                debug!(version = migration.version, change = %change, "Schema change");
            }
            if let Err(e) = self.target.apply(migration, direction).await {
                error!(
                    version = migration.version,
                    %direction,
                    error = %e,
                    "Migration failed"
                );
                return Err(e);
            }
            outcomes.push(StepOutcome {
                version: migration.version,
                name: migration.name.to_string(),
                direction,
                changes,
            });
        }

        info!(from = current, to = target, steps = outcomes.len(), "Migrations complete");
        Ok(outcomes)
    }
}
