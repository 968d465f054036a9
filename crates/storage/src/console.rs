//! Console statement execution
//!
//! Every statement resolves the tables it names against the schema, then
//! locks them (left to right) for its duration, so concurrent console
//! sessions fail fast instead of interleaving page rewrites.

use std::fmt;

use tracing::info;

use crate::command::{parse_statement, Statement};
use crate::database::Database;
use crate::Result;

/// Result of one console statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Inserted { table: String, key: u64 },
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Deleted { table: String, count: usize },
    Exit,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Inserted { table, key } => write!(f, "inserted into {} with {}_id = {}", table, table, key),
            Outcome::Rows { columns, rows } => {
                write!(f, "{}", columns.join(" | "))?;
                for row in rows {
                    write!(f, "\n{}", row.join(","))?;
                }
                Ok(())
            }
            Outcome::Deleted { table, count } => write!(f, "deleted {} row(s) from {}", count, table),
            Outcome::Exit => f.write_str("bye"),
        }
    }
}

pub struct Console<'a> {
    db: &'a Database,
}

impl<'a> Console<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Parse and run one line
    pub fn run_line(&self, line: &str) -> Result<Outcome> {
        let statement = parse_statement(line)?;
        self.execute(&statement)
    }

    pub fn execute(&self, statement: &Statement) -> Result<Outcome> {
        if matches!(statement, Statement::Exit) {
            return Ok(Outcome::Exit);
        }

        let tables = statement.tables();
        for table in &tables {
            self.db.table(table)?;
        }
        let _guard = self.db.locks().acquire(&tables)?;

        let outcome = match statement {
            Statement::Insert { table, values } => Outcome::Inserted {
                table: table.clone(),
                key: self.db.insert(table, values)?,
            },
            Statement::Select {
                columns,
                tables,
                conditions,
            } => Outcome::Rows {
                rows: self.db.select(columns, tables, conditions)?,
                columns: columns.clone(),
            },
            Statement::Delete { table, conditions } => Outcome::Deleted {
                table: table.clone(),
                count: self.db.delete(table, conditions)?,
            },
            Statement::Exit => Outcome::Exit,
        };

        info!(?tables, "Console statement executed");
        Ok(outcome)
    }
}
