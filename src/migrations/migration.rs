//! A versioned forward/reverse migration pair.

use crate::error::{SchemaError, SchemaResult};
use crate::migrations::change::SchemaChange;
use crate::models::DatabaseSchema;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// One schema version: the SQL that is executed plus the typed changes it performs.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    /// Executed verbatim against the database.
    pub up_sql: &'static str,
    pub down_sql: &'static str,
    pub up: Vec<SchemaChange>,
    pub down: Vec<SchemaChange>,
}

impl Migration {
    /// File stem, e.g. `002_add_rule_types`.
    pub fn id(&self) -> String {
        format!("{:03}_{}", self.version, self.name)
    }

    pub fn sql(&self, direction: Direction) -> &'static str {
        match direction {
            Direction::Up => self.up_sql,
            Direction::Down => self.down_sql,
        }
    }

    pub fn changes(&self, direction: Direction) -> &[SchemaChange] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }

    /// The typed changes rendered as a PostgreSQL script.
    pub fn rendered_sql(&self, direction: Direction) -> String {
        self.changes(direction)
            .iter()
            .map(|c| format!("{};\n", c.to_sql()))
            .collect()
    }

    /// Apply every change of one direction; on failure `schema` is left untouched.
    pub fn apply_to(&self, schema: &mut DatabaseSchema, direction: Direction) -> SchemaResult<()> {
        let mut working = schema.clone();
        for change in self.changes(direction) {
            change.apply(&mut working).map_err(|e| match e {
                SchemaError::Schema { message, object } => SchemaError::schema(
                    format!("{} {} failed: {}", self.id(), direction, message),
                    object,
                ),
                other => other,
            })?;
        }
        *schema = working;
        Ok(())
    }

    /// Apply up then down to a copy of `schema` and require the original back.
    pub fn verify_round_trip(&self, schema: &DatabaseSchema) -> SchemaResult<()> {
        let mut working = schema.clone();
        self.apply_to(&mut working, Direction::Up)?;
        self.apply_to(&mut working, Direction::Down)?;
        if &working != schema {
            return Err(SchemaError::schema(
                format!("{} down does not restore the schema it started from", self.id()),
                self.id(),
            ));
        }
        Ok(())
    }
}
