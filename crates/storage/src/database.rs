//! Database handle
//!
//! Owns everything a statement needs: the table index, the page store and
//! the lock registry. It is passed explicitly to every operation.

use std::path::Path;

use config::{SchemaConfig, TableSchema};
use tracing::{info, instrument};

use crate::error::StorageError;
use crate::index::HashIndex;
use crate::lock::TableLocks;
use crate::page::PageStore;
use crate::Result;

pub struct Database {
    name: String,
    tables: HashIndex<TableSchema>,
    pages: PageStore,
    locks: TableLocks,
}

impl Database {
    /// Open (and create where missing) the tables of `schema` under
    /// `<data_dir>/<schema name>`.
    ///
    /// Lock flags of existing tables are left as found, since another
    /// handle on the same directory may hold them.
    #[instrument(skip(data_dir, schema), fields(schema = %schema.name))]
    pub fn open(data_dir: impl AsRef<Path>, schema: &SchemaConfig) -> Result<Self> {
        let root = data_dir.as_ref().join(&schema.name);
        let pages = PageStore::new(&root, schema.tuples_limit);

        let mut tables = HashIndex::new();
        let mut created = 0;
        for table in schema.tables() {
            if pages.create_table(table)? {
                created += 1;
            }
            tables.insert(table.name.clone(), table.clone());
        }

        info!(
            root = %root.display(),
            tables = tables.len(),
            created,
            "Database opened"
        );

        let locks = TableLocks::new(pages.clone(), tables.iter().map(|(name, _)| name));
        Ok(Self {
            name: schema.name.clone(),
            tables,
            pages,
            locks,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema of `table`
    pub fn table(&self, table: &str) -> Result<&TableSchema> {
        self.tables
            .get(table)
            .map_err(|_| StorageError::TableNotFound(table.to_string()))
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.iter().map(|(name, _)| name).collect();
        names.sort_unstable();
        names
    }

    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    pub fn locks(&self) -> &TableLocks {
        &self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_and_reopens() {
        let dir = TempDir::new().unwrap();
        let schema = config::generate_default_schema();

        let db = Database::open(dir.path(), &schema).unwrap();
        assert_eq!(db.name(), "exchange");
        assert_eq!(db.table("user").unwrap().columns, vec!["username", "key"]);
        assert_matches!(db.table("nope"), Err(StorageError::TableNotFound(_)));
        assert_eq!(db.table_names().len(), 5);
        assert!(dir.path().join("exchange/order/1.csv").is_file());

        db.insert("lot", &["BTC".to_string()]).unwrap();
        assert!(db.locks().try_lock("lot").unwrap());
        drop(db);

        let db = Database::open(dir.path(), &schema).unwrap();
        assert!(db.pages().read_lock_flag("lot").unwrap());
        db.locks().unlock("lot").unwrap();
        assert!(!db.locks().is_locked("lot").unwrap());
        assert_eq!(db.pages().scan("lot").count(), 1);
    }
}
