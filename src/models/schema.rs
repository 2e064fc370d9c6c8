//! Schema-related data models.
//!
//! This module describes tables the way the migrations shape them: ordered
//! columns, named check constraints and named indexes. PostgreSQL appends new
//! columns, so column order is part of a table's identity; constraints and
//! indexes are keyed by name.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// SQL type as written in DDL, e.g. `INTEGER`, `TIMESTAMP WITH TIME ZONE`
    pub data_type: String,
    pub nullable: bool,
    /// SQL default expression, e.g. `5`, `NOW()`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub primary_key: bool,
}

impl ColumnDefinition {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
            primary_key: false,
        }
    }

    /// Set the default expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    /// Mark the column as the primary key (implies NOT NULL).
    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.primary_key = is_pk;
        if is_pk {
            self.nullable = false;
        }
        self
    }

    /// Column definition as it appears in CREATE TABLE / ADD COLUMN.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(ref default) = self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// `CHECK (column IN (...))` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckConstraint {
    pub name: String,
    pub column: String,
    pub allowed_values: Vec<String>,
}

impl CheckConstraint {
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        allowed_values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            allowed_values: allowed_values.into_iter().map(Into::into).collect(),
        }
    }

    /// Check expression, e.g. `CHECK (rule_type IN ('app_filter', 'time_based'))`.
    pub fn expression_sql(&self) -> String {
        let values = self
            .allowed_values
            .iter()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CHECK ({} IN ({}))", self.column, values)
    }

    pub fn admits(&self, value: &str) -> bool {
        self.allowed_values.iter().any(|v| v == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
}

impl IndexInfo {
    /// Create a new index info.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Single-column index.
    pub fn on(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(name, vec![column.into()])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
    pub checks: BTreeMap<String, CheckConstraint>,
    pub indexes: BTreeMap<String, IndexInfo>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            checks: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_check(mut self, check: CheckConstraint) -> Self {
        self.checks.insert(check.name.clone(), check);
        self
    }

    pub fn with_index(mut self, index: IndexInfo) -> Self {
        self.indexes.insert(index.name.clone(), index);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Every table created by the migration history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseSchema {
    pub tables: BTreeMap<String, TableSchema>,
}

impl DatabaseSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        self.tables.get_mut(name)
    }

    /// Index names are schema-wide in PostgreSQL.
    pub fn find_index(&self, name: &str) -> Option<(&str, &IndexInfo)> {
        self.tables
            .values()
            .find_map(|t| t.indexes.get(name).map(|idx| (t.table_name.as_str(), idx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_sql_rendering() {
        let id = ColumnDefinition::new("id", "UUID", false).with_primary_key(true);
        assert_eq!(id.to_sql(), "id UUID PRIMARY KEY");

        let active = ColumnDefinition::new("is_active", "BOOLEAN", false).with_default("TRUE");
        assert_eq!(active.to_sql(), "is_active BOOLEAN NOT NULL DEFAULT TRUE");

        let priority = ColumnDefinition::new("priority", "INTEGER", true).with_default("5");
        assert_eq!(priority.to_sql(), "priority INTEGER DEFAULT 5");
    }

    #[test]
    fn test_primary_key_forces_not_null() {
        let col = ColumnDefinition::new("id", "UUID", true).with_primary_key(true);
        assert!(!col.nullable);
    }

    #[test]
    fn test_check_expression_sql() {
        let check = CheckConstraint::new("c", "rule_type", ["app_filter", "time_based"]);
        assert_eq!(
            check.expression_sql(),
            "CHECK (rule_type IN ('app_filter', 'time_based'))"
        );
        assert!(check.admits("time_based"));
        assert!(!check.admits("promo_mute"));
    }

    #[test]
    fn test_check_expression_escapes_quotes() {
        let check = CheckConstraint::new("c", "kind", ["it's"]);
        assert_eq!(check.expression_sql(), "CHECK (kind IN ('it''s'))");
    }

    #[test]
    fn test_table_lookups() {
        let table = TableSchema::new("user_rules")
            .with_column(ColumnDefinition::new("id", "UUID", false).with_primary_key(true))
            .with_column(ColumnDefinition::new("rule_type", "VARCHAR(50)", false))
            .with_check(CheckConstraint::new("rt_check", "rule_type", ["app_filter"]))
            .with_index(IndexInfo::on("idx_rt", "rule_type"));

        assert_eq!(table.column_names(), vec!["id", "rule_type"]);
        assert!(table.has_column("rule_type"));
        assert!(!table.has_column("priority"));
        assert_eq!(table.checks["rt_check"].column, "rule_type");

        let mut db = DatabaseSchema::new();
        db.tables.insert(table.table_name.clone(), table);
        assert_eq!(db.find_index("idx_rt").unwrap().0, "user_rules");
        assert!(db.find_index("idx_missing").is_none());
    }
}
