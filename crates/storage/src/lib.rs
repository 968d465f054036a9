//! Lotbase storage engine
//!
//! A table is a directory of capped CSV pages plus a primary-key counter
//! and a lock flag. On top of the page store sit a predicate evaluator
//! (AND / OR / parentheses over column equalities) and a small query
//! engine: insert, nested-loop multi-table select and predicate delete.
//!
//! ```ignore
//! let db = Database::open("data", &schema)?;
//! let key = db.insert("lot", &["BTC".to_string()])?;
//! let rows = db.select(&["lot.name"], &["lot"], &[Condition::eq("lot.lot_id", key.to_string())])?;
//! ```

pub mod command;
pub mod console;
pub mod database;
pub mod error;
pub mod index;
pub mod lock;
pub mod page;
pub mod predicate;
pub mod query;

pub use command::{parse_statement, Statement};
pub use console::{Console, Outcome};
pub use database::Database;
pub use error::StorageError;
pub use index::HashIndex;
pub use lock::{TableLockSet, TableLocks};
pub use page::{PageStore, RewriteScope, RewriteStats, RowEdit, TableCursor};
pub use predicate::{all_of, Condition, Operand, Predicate};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
