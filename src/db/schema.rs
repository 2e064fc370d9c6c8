//! Live schema introspection.
//!
//! Reads what PostgreSQL actually holds for a table so it can be compared with
//! the schema the migration catalog says should be there.
//!
//! # Architecture
//!
//! SQL queries live in the `queries` submodule. Comparison against the
//! expected [`TableSchema`] is pure and does not need a connection.

use crate::db::pool::pool_error;
use crate::error::{SchemaError, SchemaResult};
use crate::models::{DatabaseSchema, TableSchema};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const DEFAULT_SCHEMA: &str = "public";

/// A table as it exists in the database: column names, check constraints with
/// the literal values they admit, and non-primary indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveTable {
    pub table_name: String,
    pub columns: Vec<String>,
    pub checks: BTreeMap<String, Vec<String>>,
    pub indexes: BTreeMap<String, Vec<String>>,
}

impl LiveTable {
    /// Build the view a live database would report for `table`.
    pub fn from_expected(table: &TableSchema) -> Self {
        Self {
            table_name: table.table_name.clone(),
            columns: table.column_names().iter().map(|c| c.to_string()).collect(),
            checks: table
                .checks
                .values()
                .map(|c| (c.name.clone(), c.allowed_values.clone()))
                .collect(),
            indexes: table
                .indexes
                .values()
                .map(|i| (i.name.clone(), i.columns.clone()))
                .collect(),
        }
    }
}

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Describe a table in the `public` schema.
    pub async fn describe_table(pool: &PgPool, table_name: &str) -> SchemaResult<LiveTable> {
        let columns = sqlx::query_scalar::<_, String>(queries::DESCRIBE_COLUMNS)
            .bind(DEFAULT_SCHEMA)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| pool_error(pool, e))?;

        if columns.is_empty() {
            return Err(SchemaError::schema("Table does not exist", table_name));
        }

        let checks = sqlx::query_as::<_, (String, String)>(queries::DESCRIBE_CHECKS)
            .bind(DEFAULT_SCHEMA)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| pool_error(pool, e))?
            .into_iter()
            .map(|(name, definition)| (name, quoted_literals(&definition)))
            .collect();

        let indexes = sqlx::query_as::<_, (String, Vec<String>)>(queries::DESCRIBE_INDEXES)
            .bind(DEFAULT_SCHEMA)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| pool_error(pool, e))?
            .into_iter()
            .collect();

        debug!(table = %table_name, columns = columns.len(), "Described live table");

        Ok(LiveTable {
            table_name: table_name.to_string(),
            columns,
            checks,
            indexes,
        })
    }

    /// Compare every table of `expected` with the database; returns the differences.
    pub async fn verify(pool: &PgPool, expected: &DatabaseSchema) -> SchemaResult<Vec<String>> {
        let mut differences = Vec::new();
        for table in expected.tables.values() {
            match Self::describe_table(pool, &table.table_name).await {
                Ok(live) => differences.extend(compare(table, &live)),
                Err(SchemaError::Schema { .. }) => {
                    differences.push(format!("table {} is missing", table.table_name))
                }
                Err(e) => return Err(e),
            }
        }
        Ok(differences)
    }
}

/// Differences between the expected and the live table, one line each.
///
/// Column order is ignored; check values are compared as sets.
pub fn compare(expected: &TableSchema, live: &LiveTable) -> Vec<String> {
    let table = &expected.table_name;
    let mut differences = Vec::new();

    let live_columns: BTreeSet<&str> = live.columns.iter().map(String::as_str).collect();
    let expected_columns: BTreeSet<&str> = expected.column_names().into_iter().collect();
    for missing in expected_columns.difference(&live_columns) {
        differences.push(format!("{}: column {} is missing", table, missing));
    }
    for extra in live_columns.difference(&expected_columns) {
        differences.push(format!("{}: unexpected column {}", table, extra));
    }

    for (name, check) in &expected.checks {
        match live.checks.get(name) {
            None => differences.push(format!("{}: check constraint {} is missing", table, name)),
            Some(values) => {
                let want: BTreeSet<&str> = check.allowed_values.iter().map(String::as_str).collect();
                let have: BTreeSet<&str> = values.iter().map(String::as_str).collect();
                if want != have {
                    differences.push(format!(
                        "{}: check constraint {} allows {:?}, expected {:?}",
                        table, name, have, want
                    ));
                }
            }
        }
    }
    for name in live.checks.keys() {
        if !expected.checks.contains_key(name) {
            differences.push(format!("{}: unexpected check constraint {}", table, name));
        }
    }

    for (name, index) in &expected.indexes {
        match live.indexes.get(name) {
            None => differences.push(format!("{}: index {} is missing", table, name)),
            Some(columns) if *columns != index.columns => differences.push(format!(
                "{}: index {} covers {:?}, expected {:?}",
                table, name, columns, index.columns
            )),
            Some(_) => {}
        }
    }
    for name in live.indexes.keys() {
        if !expected.indexes.contains_key(name) {
            differences.push(format!("{}: unexpected index {}", table, name));
        }
    }

    differences
}

/// Extract the single-quoted literals of a constraint definition, in order.
///
/// `pg_get_constraintdef` renders `IN (...)` as
/// `(rule_type)::text = ANY ((ARRAY['a'::character varying, ...])::text[])`.
pub fn quoted_literals(definition: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut chars = definition.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut literal = String::new();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    literal.push('\'');
                } else {
                    break;
                }
            } else {
                literal.push(c);
            }
        }
        literals.push(literal);
    }

    literals
}

mod queries {
    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT c.column_name::text
        FROM information_schema.columns c
        WHERE c.table_schema = $1 AND c.table_name = $2
        ORDER BY c.ordinal_position
        "#;

    pub const DESCRIBE_CHECKS: &str = r#"
        SELECT
            con.conname::text AS constraint_name,
            pg_get_constraintdef(con.oid) AS definition
        FROM pg_constraint con
        JOIN pg_class t ON t.oid = con.conrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        WHERE con.contype = 'c' AND n.nspname = $1 AND t.relname = $2
        ORDER BY con.conname
        "#;

    pub const DESCRIBE_INDEXES: &str = r#"
        SELECT
            i.relname::text AS index_name,
            array_agg(a.attname::text ORDER BY array_position(ix.indkey, a.attnum)) AS column_names
        FROM pg_index ix
        JOIN pg_class i ON i.oid = ix.indexrelid
        JOIN pg_class t ON t.oid = ix.indrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
        WHERE n.nspname = $1 AND t.relname = $2 AND NOT ix.indisprimary
        GROUP BY i.relname
        ORDER BY i.relname
        "#;
}
