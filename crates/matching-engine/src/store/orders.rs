//! Order table access
//!
//! Orders are appended once and afterwards only two fields ever change:
//! the quantity of a partially filled resting order and the `closed`
//! timestamp. Both mutations apply to open orders only, which keeps
//! `closed` write-once.

use common::{format_amount, Side};
use storage::{all_of, Condition, Database, RewriteScope, RowEdit};
use tracing::{debug, instrument};

use super::select_rows;
use crate::domain::{Order, OrderRecord};
use crate::Result;

const TABLE: &str = "order";
const QUANTITY: usize = 3;
const CLOSED: usize = 6;

pub struct OrderStore<'a> {
    db: &'a Database,
}

impl<'a> OrderStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append an order row, returning its key
    pub fn insert(&self, record: &OrderRecord) -> Result<u64> {
        Ok(self.db.insert(TABLE, &record.values())?)
    }

    pub fn find(&self, order_id: u64) -> Result<Option<Order>> {
        select_rows(
            self.db,
            TABLE,
            &[Condition::eq("order.order_id", order_id.to_string())],
        )?
        .first()
        .map(|row| Order::from_row(row))
        .transpose()
    }

    /// Every order ever placed, open and closed, in table order
    pub fn all(&self) -> Result<Vec<Order>> {
        select_rows(self.db, TABLE, &[])?
            .iter()
            .map(|row| Order::from_row(row))
            .collect()
    }

    /// Open orders of one side on a pair, in table order
    pub fn open_on_pair(&self, pair_id: u64, side: Side) -> Result<Vec<Order>> {
        let rows = select_rows(
            self.db,
            TABLE,
            &all_of(vec![
                Condition::eq("order.pair_id", pair_id.to_string()),
                Condition::eq("order.type", side.as_str()),
                Condition::eq("order.closed", ""),
            ]),
        )?;
        rows.iter().map(|row| Order::from_row(row)).collect()
    }

    /// Stamp an open order as closed. Returns false when the order does
    /// not exist or is already closed.
    #[instrument(skip(self))]
    pub fn close(&self, order_id: u64, timestamp: &str) -> Result<bool> {
        self.update_open(order_id, |row| row[CLOSED] = timestamp.to_string())
    }

    /// Replace the quantity of an open order
    #[instrument(skip(self))]
    pub fn set_quantity(&self, order_id: u64, quantity: f64) -> Result<bool> {
        self.update_open(order_id, |row| row[QUANTITY] = format_amount(quantity))
    }

    fn update_open<F>(&self, order_id: u64, mut apply: F) -> Result<bool>
    where
        F: FnMut(&mut Vec<String>),
    {
        let key = order_id.to_string();
        let stats = self
            .db
            .pages()
            .rewrite(TABLE, RewriteScope::FirstChange, |row: &[String]| -> Result<RowEdit> {
                let open = row.get(CLOSED).map_or(true, |c| c.is_empty());
                if row.first() != Some(&key) || !open {
                    return Ok(RowEdit::Keep);
                }
                let mut updated = row.to_vec();
                updated.resize(CLOSED + 1, String::new());
                apply(&mut updated);
                Ok(RowEdit::Update(updated))
            })?;

        let changed = stats.updated > 0;
        debug!(order_id, changed, "Order row rewritten");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_db;
    use tempfile::TempDir;

    #[test]
    fn test_insert_and_find() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let orders = OrderStore::new(&db);

        let id = orders
            .insert(&OrderRecord::open(1, 1, Side::Sell, 10.0, 100.0))
            .unwrap();
        assert_eq!(id, 1);

        let order = orders.find(id).unwrap().unwrap();
        assert_eq!(order.user_id, 1);
        assert_eq!(order.quantity, 10.0);
        assert_eq!(order.side, Side::Sell);
        assert!(order.is_open());
        assert!(orders.find(99).unwrap().is_none());
    }

    #[test]
    fn test_open_on_pair_filters() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let orders = OrderStore::new(&db);

        orders.insert(&OrderRecord::open(1, 1, Side::Sell, 1.0, 10.0)).unwrap();
        orders.insert(&OrderRecord::open(1, 2, Side::Sell, 1.0, 10.0)).unwrap();
        orders.insert(&OrderRecord::open(1, 1, Side::Buy, 1.0, 10.0)).unwrap();
        orders
            .insert(&OrderRecord::settled(1, 1, Side::Sell, 1.0, 10.0, "1700000000"))
            .unwrap();
        orders.insert(&OrderRecord::open(2, 1, Side::Sell, 2.0, 9.0)).unwrap();

        let open: Vec<u64> = orders
            .open_on_pair(1, Side::Sell)
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(open, vec![1, 5]);
        assert_eq!(orders.all().unwrap().len(), 5);
    }

    #[test]
    fn test_close_is_write_once() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let orders = OrderStore::new(&db);

        let id = orders.insert(&OrderRecord::open(1, 1, Side::Buy, 3.0, 5.0)).unwrap();
        assert!(orders.close(id, "1700000000").unwrap());
        assert!(!orders.close(id, "1800000000").unwrap());
        assert!(!orders.set_quantity(id, 1.0).unwrap());

        let order = orders.find(id).unwrap().unwrap();
        assert_eq!(order.closed, "1700000000");
        assert_eq!(order.quantity, 3.0);
        assert!(!orders.close(42, "1700000000").unwrap());
    }

    #[test]
    fn test_set_quantity_on_open_order() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let orders = OrderStore::new(&db);

        orders.insert(&OrderRecord::open(1, 1, Side::Sell, 10.0, 100.0)).unwrap();
        let id = orders.insert(&OrderRecord::open(2, 1, Side::Sell, 10.0, 100.0)).unwrap();

        assert!(orders.set_quantity(id, 6.0).unwrap());
        assert_eq!(orders.find(id).unwrap().unwrap().quantity, 6.0);
        assert_eq!(orders.find(1).unwrap().unwrap().quantity, 10.0);
        assert!(orders.find(id).unwrap().unwrap().is_open());
    }
}
