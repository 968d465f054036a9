//! Table locks
//!
//! Non-blocking, non-reentrant, one holder per table. The authoritative
//! state is the `<table>_lock` flag file, so a table held by one process
//! is refused to every other handle on the same data directory. Only
//! tables of the schema can be locked.

use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::page::PageStore;
use crate::Result;

#[derive(Debug)]
pub struct TableLocks {
    pages: PageStore,
    tables: HashSet<String>,
    // serializes flag swaps between threads of this process
    swap: Mutex<()>,
}

impl TableLocks {
    pub fn new<I, S>(pages: PageStore, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages,
            tables: tables.into_iter().map(Into::into).collect(),
            swap: Mutex::new(()),
        }
    }

    fn known(&self, table: &str) -> Result<()> {
        if self.tables.contains(table) {
            Ok(())
        } else {
            Err(StorageError::TableNotFound(table.to_string()))
        }
    }

    /// Try to take the lock on `table`; returns false if any handle holds it
    pub fn try_lock(&self, table: &str) -> Result<bool> {
        self.known(table)?;
        let _swap = self.swap.lock();
        if self.pages.swap_lock_flag(table, true)? {
            warn!(table, "Table lock contention");
            return Ok(false);
        }
        debug!(table, "Table locked");
        Ok(true)
    }

    /// Release `table` unconditionally
    pub fn unlock(&self, table: &str) -> Result<()> {
        self.known(table)?;
        let _swap = self.swap.lock();
        self.pages.swap_lock_flag(table, false)?;
        debug!(table, "Table unlocked");
        Ok(())
    }

    pub fn is_locked(&self, table: &str) -> Result<bool> {
        self.known(table)?;
        self.pages.read_lock_flag(table)
    }

    /// Lock every table in order, all or nothing
    pub fn acquire<S: AsRef<str>>(&self, tables: &[S]) -> Result<TableLockSet<'_>> {
        TableLockSet::acquire(self, tables)
    }
}

/// A group of held table locks, released in acquisition order on drop
#[derive(Debug)]
pub struct TableLockSet<'a> {
    locks: &'a TableLocks,
    tables: Vec<String>,
}

impl<'a> TableLockSet<'a> {
    /// Lock `tables` left to right. On the first failure every lock taken
    /// so far is released in reverse order and the contended table is
    /// reported. A table listed twice is locked once.
    pub fn acquire<S: AsRef<str>>(locks: &'a TableLocks, tables: &[S]) -> Result<Self> {
        let mut held: Vec<String> = Vec::with_capacity(tables.len());

        for table in tables {
            let table = table.as_ref();
            if held.iter().any(|t| t == table) {
                continue;
            }

            let acquired = match locks.try_lock(table) {
                Ok(acquired) => acquired,
                Err(e) => {
                    Self::unwind(locks, &held);
                    return Err(e);
                }
            };

            if !acquired {
                Self::unwind(locks, &held);
                return Err(StorageError::LockContention(table.to_string()));
            }
            held.push(table.to_string());
        }

        Ok(Self {
            locks,
            tables: held,
        })
    }

    fn unwind(locks: &TableLocks, held: &[String]) {
        for table in held.iter().rev() {
            if let Err(e) = locks.unlock(table) {
                warn!(table = %table, error = %e, "Failed to release table lock");
            }
        }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}

impl Drop for TableLockSet<'_> {
    fn drop(&mut self) {
        for table in &self.tables {
            if let Err(e) = self.locks.unlock(table) {
                warn!(table = %table, error = %e, "Failed to release table lock");
            }
        }
    }
}
