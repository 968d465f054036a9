//! Query engine: insert, multi-table select and predicate delete

use config::TableSchema;
use tracing::{debug, instrument};

use crate::database::Database;
use crate::error::StorageError;
use crate::page::TableCursor;
use crate::predicate::{Condition, Operand, Predicate};
use crate::Result;

/// Fully qualified column names of a table: `t.t_id`, `t.col`, ...
pub fn qualified_columns(schema: &TableSchema) -> Vec<String> {
    std::iter::once(schema.pk_column())
        .chain(schema.columns.iter().cloned())
        .map(|c| format!("{}.{}", schema.name, c))
        .collect()
}

/// Cartesian product over one cursor per table, odometer style: the last
/// table advances fastest and every table after the one that moved is
/// rewound to its first row.
struct CrossProduct {
    cursors: Vec<TableCursor>,
    current: Vec<Vec<String>>,
    started: bool,
    done: bool,
}

impl CrossProduct {
    fn new(cursors: Vec<TableCursor>) -> Self {
        let done = cursors.is_empty();
        Self {
            current: Vec::with_capacity(cursors.len()),
            cursors,
            started: false,
            done,
        }
    }

    fn joined(&self) -> Vec<String> {
        self.current.iter().flatten().cloned().collect()
    }

    fn start(&mut self) -> Result<bool> {
        self.started = true;
        for cursor in self.cursors.iter_mut() {
            match cursor.next() {
                Some(row) => self.current.push(row?),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    fn advance(&mut self) -> Result<bool> {
        let mut level = self.cursors.len();
        while level > 0 {
            level -= 1;
            if let Some(row) = self.cursors[level].next() {
                self.current[level] = row?;
                for inner in level + 1..self.cursors.len() {
                    self.cursors[inner].rewind();
                    match self.cursors[inner].next() {
                        Some(row) => self.current[inner] = row?,
                        None => return Ok(false),
                    }
                }
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Iterator for CrossProduct {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let step = if self.started {
            self.advance()
        } else {
            self.start()
        };

        match step {
            Ok(true) => Some(Ok(self.joined())),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Database {
    /// Append a row to `table`, returning its primary key
    #[instrument(skip(self, values), fields(count = values.len()))]
    pub fn insert(&self, table: &str, values: &[String]) -> Result<u64> {
        let schema = self.table(table)?;
        self.pages().append(schema, values)
    }

    /// Nested-loop join of `tables`, filtered by `conditions` and projected
    /// onto `columns` (all qualified as `table.column`).
    ///
    /// Rows come back in scan order, first table outermost.
    #[instrument(skip_all, fields(tables = tables.len()))]
    pub fn select<C, T>(
        &self,
        columns: &[C],
        tables: &[T],
        conditions: &[Condition],
    ) -> Result<Vec<Vec<String>>>
    where
        C: AsRef<str>,
        T: AsRef<str>,
    {
        if tables.is_empty() {
            return Err(StorageError::parse("select needs at least one table"));
        }

        let mut joined_columns = Vec::new();
        let mut cursors = Vec::with_capacity(tables.len());
        for table in tables {
            let schema = self.table(table.as_ref())?;
            joined_columns.extend(qualified_columns(schema));
            cursors.push(self.pages().scan(&schema.name));
        }

        let projection = columns
            .iter()
            .map(|c| {
                let c = c.as_ref();
                joined_columns
                    .iter()
                    .position(|jc| jc == c)
                    .ok_or_else(|| StorageError::UnknownColumn(c.to_string()))
            })
            .collect::<Result<Vec<usize>>>()?;

        let predicate = Predicate::compile(conditions)?;

        let mut rows = Vec::new();
        for joined in CrossProduct::new(cursors) {
            let joined = joined?;
            if predicate.matches(&joined_columns, &joined) {
                rows.push(
                    projection
                        .iter()
                        .map(|&i| joined.get(i).cloned().unwrap_or_default())
                        .collect(),
                );
            }
        }

        debug!(rows = rows.len(), "Select finished");
        Ok(rows)
    }

    /// Remove every row of `table` matching `conditions`; returns the
    /// number of removed rows.
    ///
    /// Column names may be qualified with the table name and literals may
    /// carry surrounding quotes; both are stripped before matching.
    #[instrument(skip(self, conditions))]
    pub fn delete(&self, table: &str, conditions: &[Condition]) -> Result<usize> {
        let schema = self.table(table)?;
        let columns: Vec<String> = std::iter::once(schema.pk_column())
            .chain(schema.columns.iter().cloned())
            .collect();

        let prefix = format!("{}.", table);
        let strip_table = |name: &str| -> String {
            name.strip_prefix(&prefix).unwrap_or(name).to_string()
        };

        let local: Vec<Condition> = conditions
            .iter()
            .map(|term| match term {
                Condition::Eq { column, value } => Condition::Eq {
                    column: strip_table(column),
                    value: match value {
                        Operand::Literal(v) => Operand::Literal(strip_quotes(v).to_string()),
                        Operand::Column(c) => Operand::Column(strip_table(c)),
                    },
                },
                other => other.clone(),
            })
            .collect();

        let predicate = Predicate::compile(&local)?;
        let removed = self
            .pages()
            .rewrite_filtered(table, |row| !predicate.matches(&columns, row))?;

        debug!(table, removed, "Delete finished");
        Ok(removed)
    }
}

fn strip_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}
