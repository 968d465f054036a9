//! Table access for the exchange
//!
//! The query engine offers append, select and predicate delete but no
//! update. Balances and order state change in place through the two
//! mutators here, which rewrite the affected page directly.

mod ledger;
mod orders;

pub use ledger::Ledger;
pub use orders::OrderStore;

use storage::query::qualified_columns;
use storage::{Condition, Database};

use crate::Result;

/// Every column of `table` (key first) for the rows matching `conditions`
pub(crate) fn select_rows(
    db: &Database,
    table: &str,
    conditions: &[Condition],
) -> Result<Vec<Vec<String>>> {
    let schema = db.table(table)?;
    Ok(db.select(&qualified_columns(schema), &[table], conditions)?)
}
