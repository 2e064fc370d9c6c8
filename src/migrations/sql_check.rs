//! Static validation of migration scripts.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) with the PostgreSQL dialect so a
//! malformed or non-DDL script is rejected before it reaches the database.

use crate::error::{SchemaError, SchemaResult};
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Kind of statement found in a migration script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable,
    CreateIndex,
    AlterTable,
    Drop,
    /// Anything a schema migration should not contain (DML, transaction control, ...)
    Other,
}

fn classify_statement(stmt: &Statement) -> StatementKind {
    match stmt {
        Statement::CreateTable { .. } => StatementKind::CreateTable,
        Statement::CreateIndex { .. } => StatementKind::CreateIndex,
        Statement::AlterTable { .. } => StatementKind::AlterTable,
        Statement::Drop { .. } => StatementKind::Drop,
        _ => StatementKind::Other,
    }
}

/// Parse a script into PostgreSQL statements.
pub fn parse_script(sql: &str) -> SchemaResult<Vec<Statement>> {
    Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| SchemaError::invalid_input(format!("Failed to parse migration SQL: {}", e)))
}

/// Validate that a script parses and contains only DDL; returns the statement kinds.
pub fn validate_ddl(sql: &str) -> SchemaResult<Vec<StatementKind>> {
    let statements = parse_script(sql)?;
    if statements.is_empty() {
        return Err(SchemaError::invalid_input("Empty migration script"));
    }

    statements
        .iter()
        .map(|stmt| match classify_statement(stmt) {
            StatementKind::Other => Err(SchemaError::invalid_input(format!(
                "Migration scripts may only contain DDL, found: {}",
                stmt
            ))),
            kind => Ok(kind),
        })
        .collect()
}

/// Canonical text of every statement, used to compare two scripts independent of layout.
pub fn canonical_statements(sql: &str) -> SchemaResult<Vec<String>> {
    Ok(parse_script(sql)?.iter().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_is_accepted() {
        let kinds = validate_ddl(
            "ALTER TABLE user_rules ADD COLUMN IF NOT EXISTS priority INTEGER DEFAULT 5;
             CREATE INDEX IF NOT EXISTS idx_p ON user_rules(priority);
             DROP INDEX IF EXISTS idx_p;",
        )
        .unwrap();
        assert_eq!(
            kinds,
            vec![
                StatementKind::AlterTable,
                StatementKind::CreateIndex,
                StatementKind::Drop
            ]
        );
    }

    #[test]
    fn test_dml_is_rejected() {
        let err = validate_ddl("DELETE FROM user_rules").unwrap_err();
        assert!(err.to_string().contains("only contain DDL"));
    }

    #[test]
    fn test_empty_script_is_rejected() {
        assert!(validate_ddl("-- nothing here\n").is_err());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = validate_ddl("ALTER TABLE").unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_canonical_statements_ignore_layout() {
        let a = canonical_statements("CREATE INDEX idx ON t(c);").unwrap();
        let b = canonical_statements("CREATE   INDEX idx\n    ON t (c)").unwrap();
        assert_eq!(a, b);
    }
}
