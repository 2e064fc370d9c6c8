//! Typed DDL operations.
//!
//! Each [`SchemaChange`] renders to one PostgreSQL statement and can be
//! replayed against a [`DatabaseSchema`]. Replay follows PostgreSQL semantics:
//! guarded operations (`IF EXISTS` / `IF NOT EXISTS`) are no-ops when their
//! target is missing or already present, unguarded ones fail.

use crate::error::{SchemaError, SchemaResult};
use crate::models::{CheckConstraint, ColumnDefinition, DatabaseSchema, IndexInfo, TableSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// Columns and check constraints are created inline; indexes are not.
    CreateTable {
        table: TableSchema,
        if_not_exists: bool,
    },
    DropTable {
        table: String,
        if_exists: bool,
    },
    AddColumn {
        table: String,
        column: ColumnDefinition,
        if_not_exists: bool,
    },
    DropColumn {
        table: String,
        column: String,
        if_exists: bool,
    },
    AddCheckConstraint {
        table: String,
        check: CheckConstraint,
    },
    DropConstraint {
        table: String,
        name: String,
        if_exists: bool,
    },
    CreateIndex {
        table: String,
        index: IndexInfo,
        if_not_exists: bool,
    },
    DropIndex {
        name: String,
        if_exists: bool,
    },
}

fn guard(flag: bool, clause: &str) -> String {
    if flag {
        format!("{clause} ")
    } else {
        String::new()
    }
}

impl SchemaChange {
    /// Render as a single PostgreSQL statement without the trailing semicolon.
    pub fn to_sql(&self) -> String {
        match self {
            Self::CreateTable {
                table,
                if_not_exists,
            } => {
                let mut parts: Vec<String> = table.columns.iter().map(|c| c.to_sql()).collect();
                parts.extend(
                    table
                        .checks
                        .values()
                        .map(|c| format!("CONSTRAINT {} {}", c.name, c.expression_sql())),
                );
                format!(
                    "CREATE TABLE {}{} ({})",
                    guard(*if_not_exists, "IF NOT EXISTS"),
                    table.table_name,
                    parts.join(", ")
                )
            }
            Self::DropTable { table, if_exists } => {
                format!("DROP TABLE {}{}", guard(*if_exists, "IF EXISTS"), table)
            }
            Self::AddColumn {
                table,
                column,
                if_not_exists,
            } => format!(
                "ALTER TABLE {} ADD COLUMN {}{}",
                table,
                guard(*if_not_exists, "IF NOT EXISTS"),
                column.to_sql()
            ),
            Self::DropColumn {
                table,
                column,
                if_exists,
            } => format!(
                "ALTER TABLE {} DROP COLUMN {}{}",
                table,
                guard(*if_exists, "IF EXISTS"),
                column
            ),
            Self::AddCheckConstraint { table, check } => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} {}",
                table,
                check.name,
                check.expression_sql()
            ),
            Self::DropConstraint {
                table,
                name,
                if_exists,
            } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}{}",
                table,
                guard(*if_exists, "IF EXISTS"),
                name
            ),
            Self::CreateIndex {
                table,
                index,
                if_not_exists,
            } => format!(
                "CREATE INDEX {}{} ON {}({})",
                guard(*if_not_exists, "IF NOT EXISTS"),
                index.name,
                table,
                index.columns.join(", ")
            ),
            Self::DropIndex { name, if_exists } => {
                format!("DROP INDEX {}{}", guard(*if_exists, "IF EXISTS"), name)
            }
        }
    }

    /// Short human-readable summary for plans and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => format!("create table {}", table.table_name),
            Self::DropTable { table, .. } => format!("drop table {}", table),
            Self::AddColumn { table, column, .. } => {
                format!("add column {}.{}", table, column.name)
            }
            Self::DropColumn { table, column, .. } => format!("drop column {}.{}", table, column),
            Self::AddCheckConstraint { table, check } => format!(
                "add constraint {} on {}.{} ({} values)",
                check.name,
                table,
                check.column,
                check.allowed_values.len()
            ),
            Self::DropConstraint { table, name, .. } => {
                format!("drop constraint {} on {}", name, table)
            }
            Self::CreateIndex { table, index, .. } => format!(
                "create index {} on {}({})",
                index.name,
                table,
                index.columns.join(", ")
            ),
            Self::DropIndex { name, .. } => format!("drop index {}", name),
        }
    }

    /// Replay this change against an in-memory schema.
    pub fn apply(&self, schema: &mut DatabaseSchema) -> SchemaResult<()> {
        match self {
            Self::CreateTable {
                table,
                if_not_exists,
            } => {
                if schema.tables.contains_key(&table.table_name) {
                    return skip_or_fail(
                        *if_not_exists,
                        "Table already exists",
                        &table.table_name,
                    );
                }
                let mut created = table.clone();
                created.indexes.clear();
                schema.tables.insert(created.table_name.clone(), created);
                Ok(())
            }
            Self::DropTable { table, if_exists } => {
                if schema.tables.remove(table).is_none() {
                    return skip_or_fail(*if_exists, "Table does not exist", table);
                }
                Ok(())
            }
            Self::AddColumn {
                table,
                column,
                if_not_exists,
            } => {
                let t = existing_table(schema, table)?;
                if t.has_column(&column.name) {
                    return skip_or_fail(
                        *if_not_exists,
                        "Column already exists",
                        &format!("{}.{}", table, column.name),
                    );
                }
                t.columns.push(column.clone());
                Ok(())
            }
            Self::DropColumn {
                table,
                column,
                if_exists,
            } => {
                let t = existing_table(schema, table)?;
                let Some(pos) = t.columns.iter().position(|c| &c.name == column) else {
                    return skip_or_fail(
                        *if_exists,
                        "Column does not exist",
                        &format!("{}.{}", table, column),
                    );
                };
                t.columns.remove(pos);
                // Dependent indexes and constraints go with the column.
                t.indexes.retain(|_, idx| !idx.columns.contains(column));
                t.checks.retain(|_, check| &check.column != column);
                Ok(())
            }
            Self::AddCheckConstraint { table, check } => {
                let t = existing_table(schema, table)?;
                if t.checks.contains_key(&check.name) {
                    return Err(SchemaError::schema(
                        "Constraint already exists",
                        format!("{}.{}", table, check.name),
                    ));
                }
                if !t.has_column(&check.column) {
                    return Err(SchemaError::schema(
                        "Constraint references a missing column",
                        format!("{}.{}", table, check.column),
                    ));
                }
                t.checks.insert(check.name.clone(), check.clone());
                Ok(())
            }
            Self::DropConstraint {
                table,
                name,
                if_exists,
            } => {
                let t = existing_table(schema, table)?;
                if t.checks.remove(name).is_none() {
                    return skip_or_fail(
                        *if_exists,
                        "Constraint does not exist",
                        &format!("{}.{}", table, name),
                    );
                }
                Ok(())
            }
            Self::CreateIndex {
                table,
                index,
                if_not_exists,
            } => {
                if schema.find_index(&index.name).is_some() {
                    return skip_or_fail(*if_not_exists, "Index already exists", &index.name);
                }
                let t = existing_table(schema, table)?;
                if let Some(missing) = index.columns.iter().find(|c| !t.has_column(c)) {
                    return Err(SchemaError::schema(
                        "Index references a missing column",
                        format!("{}.{}", table, missing),
                    ));
                }
                t.indexes.insert(index.name.clone(), index.clone());
                Ok(())
            }
            Self::DropIndex { name, if_exists } => {
                let owner = schema.find_index(name).map(|(t, _)| t.to_string());
                match owner.and_then(|t| schema.table_mut(&t)) {
                    Some(t) => {
                        t.indexes.remove(name);
                        Ok(())
                    }
                    None => skip_or_fail(*if_exists, "Index does not exist", name),
                }
            }
        }
    }
}

fn existing_table<'a>(schema: &'a mut DatabaseSchema, name: &str) -> SchemaResult<&'a mut TableSchema> {
    schema
        .table_mut(name)
        .ok_or_else(|| SchemaError::schema("Table does not exist", name))
}

fn skip_or_fail(guarded: bool, message: &str, object: &str) -> SchemaResult<()> {
    if guarded {
        Ok(())
    } else {
        Err(SchemaError::schema(message, object))
    }
}
