//! The ordered `user_rules` migration history.

use crate::error::{SchemaError, SchemaResult};
use crate::migrations::change::SchemaChange;
use crate::migrations::migration::{Direction, Migration};
use crate::models::{
    CheckConstraint, ColumnDefinition, DatabaseSchema, IndexInfo, RuleType, TableSchema,
};
use std::sync::LazyLock;

pub const USER_RULES: &str = "user_rules";
pub const RULE_TYPE_CHECK: &str = "user_rules_rule_type_check";
pub const IDX_USER_ID: &str = "idx_user_rules_user_id";
pub const IDX_PRIORITY: &str = "idx_user_rules_priority";
pub const IDX_IS_ACTIVE: &str = "idx_user_rules_is_active";

/// Default for `user_rules.priority` (medium priority).
pub const DEFAULT_RULE_PRIORITY: i32 = 5;

static CATALOG: LazyLock<Vec<Migration>> =
    LazyLock::new(|| vec![create_user_rules(), add_rule_types()]);

/// All migrations, ordered by version.
pub fn catalog() -> &'static [Migration] {
    &CATALOG
}

pub fn find(version: u32) -> Option<&'static Migration> {
    catalog().iter().find(|m| m.version == version)
}

/// Highest version in the catalog.
pub fn latest_version() -> u32 {
    catalog().last().map(|m| m.version).unwrap_or(0)
}

/// Schema produced by replaying the catalog from scratch up to `version`.
pub fn schema_at(version: u32) -> SchemaResult<DatabaseSchema> {
    ensure_known(version)?;
    let mut schema = DatabaseSchema::new();
    for migration in catalog().iter().take_while(|m| m.version <= version) {
        migration.apply_to(&mut schema, Direction::Up)?;
    }
    Ok(schema)
}

/// Steps needed to move a database from `current` to `target`.
///
/// Moving up applies each newer migration in ascending order; moving down
/// reverts each applied migration above `target` in descending order.
pub fn plan(current: u32, target: u32) -> SchemaResult<Vec<(&'static Migration, Direction)>> {
    ensure_known(current)?;
    ensure_known(target)?;

    let steps = if target >= current {
        catalog()
            .iter()
            .filter(|m| m.version > current && m.version <= target)
            .map(|m| (m, Direction::Up))
            .collect()
    } else {
        catalog()
            .iter()
            .rev()
            .filter(|m| m.version <= current && m.version > target)
            .map(|m| (m, Direction::Down))
            .collect()
    };
    Ok(steps)
}

/// Version 0 (empty database) and every catalog version are valid targets.
fn ensure_known(version: u32) -> SchemaResult<()> {
    if version == 0 || find(version).is_some() {
        Ok(())
    } else {
        Err(SchemaError::invalid_input(format!(
            "Unknown schema version {} (latest is {})",
            version,
            latest_version()
        )))
    }
}

fn rule_type_check(version: u32) -> CheckConstraint {
    CheckConstraint::new(RULE_TYPE_CHECK, "rule_type", RuleType::allowed_values_at(version))
}

fn create_user_rules() -> Migration {
    let table = TableSchema::new(USER_RULES)
        .with_column(ColumnDefinition::new("id", "UUID", false).with_primary_key(true))
        .with_column(ColumnDefinition::new("user_id", "UUID", false))
        .with_column(ColumnDefinition::new("rule_name", "VARCHAR(255)", false))
        .with_column(ColumnDefinition::new("rule_type", "VARCHAR(50)", false))
        .with_column(ColumnDefinition::new("conditions", "JSONB", false))
        .with_column(ColumnDefinition::new("actions", "JSONB", false))
        .with_column(ColumnDefinition::new("is_active", "BOOLEAN", false).with_default("TRUE"))
        .with_column(
            ColumnDefinition::new("created_at", "TIMESTAMP WITH TIME ZONE", false)
                .with_default("NOW()"),
        )
        .with_check(rule_type_check(1));

    Migration {
        version: 1,
        name: "create_user_rules",
        up_sql: include_str!("../../migrations/001_create_user_rules.up.sql"),
        down_sql: include_str!("../../migrations/001_create_user_rules.down.sql"),
        up: vec![
            SchemaChange::CreateTable {
                table,
                if_not_exists: true,
            },
            SchemaChange::CreateIndex {
                table: USER_RULES.to_string(),
                index: IndexInfo::on(IDX_USER_ID, "user_id"),
                if_not_exists: true,
            },
        ],
        down: vec![
            SchemaChange::DropIndex {
                name: IDX_USER_ID.to_string(),
                if_exists: true,
            },
            SchemaChange::DropTable {
                table: USER_RULES.to_string(),
                if_exists: true,
            },
        ],
    }
}

fn add_rule_types() -> Migration {
    let table = || USER_RULES.to_string();

    Migration {
        version: 2,
        name: "add_rule_types",
        up_sql: include_str!("../../migrations/002_add_rule_types.up.sql"),
        down_sql: include_str!("../../migrations/002_add_rule_types.down.sql"),
        up: vec![
            SchemaChange::DropConstraint {
                table: table(),
                name: RULE_TYPE_CHECK.to_string(),
                if_exists: true,
            },
            SchemaChange::AddCheckConstraint {
                table: table(),
                check: rule_type_check(2),
            },
            SchemaChange::AddColumn {
                table: table(),
                column: ColumnDefinition::new("priority", "INTEGER", true)
                    .with_default(DEFAULT_RULE_PRIORITY.to_string()),
                if_not_exists: true,
            },
            SchemaChange::AddColumn {
                table: table(),
                column: ColumnDefinition::new("updated_at", "TIMESTAMP WITH TIME ZONE", true)
                    .with_default("NOW()"),
                if_not_exists: true,
            },
            SchemaChange::CreateIndex {
                table: table(),
                index: IndexInfo::on(IDX_PRIORITY, "priority"),
                if_not_exists: true,
            },
            SchemaChange::CreateIndex {
                table: table(),
                index: IndexInfo::on(IDX_IS_ACTIVE, "is_active"),
                if_not_exists: true,
            },
        ],
        down: vec![
            SchemaChange::DropIndex {
                name: IDX_IS_ACTIVE.to_string(),
                if_exists: true,
            },
            SchemaChange::DropIndex {
                name: IDX_PRIORITY.to_string(),
                if_exists: true,
            },
            SchemaChange::DropColumn {
                table: table(),
                column: "updated_at".to_string(),
                if_exists: true,
            },
            SchemaChange::DropColumn {
                table: table(),
                column: "priority".to_string(),
                if_exists: true,
            },
            // Unguarded: reverting onto a schema without the constraint is an error.
            SchemaChange::DropConstraint {
                table: table(),
                name: RULE_TYPE_CHECK.to_string(),
                if_exists: false,
            },
            SchemaChange::AddCheckConstraint {
                table: table(),
                check: rule_type_check(1),
            },
        ],
    }
}
