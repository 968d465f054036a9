//! Balance ledger
//!
//! One `user_lot` row per (user, lot). A row whose quantity reaches zero
//! is removed rather than kept at zero, so a missing row reads as an empty
//! balance.

use common::{format_amount, EPSILON};
use storage::{all_of, Condition, Database, RewriteScope, RowEdit};
use tracing::{debug, instrument};

use super::select_rows;
use crate::domain::{Balance, LedgerEntry};
use crate::error::ExchangeError;
use crate::Result;

const TABLE: &str = "user_lot";

pub struct Ledger<'a> {
    db: &'a Database,
}

impl<'a> Ledger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Current quantity of `lot_id` held by `user_id`
    pub fn balance(&self, user_id: u64, lot_id: u64) -> Result<f64> {
        let rows = select_rows(
            self.db,
            TABLE,
            &all_of(vec![
                Condition::eq("user_lot.user_id", user_id.to_string()),
                Condition::eq("user_lot.lot_id", lot_id.to_string()),
            ]),
        )?;
        match rows.first() {
            Some(row) => Ok(LedgerEntry::from_row(row)?.quantity),
            None => Ok(0.0),
        }
    }

    /// Every balance row of a user, in ledger order
    pub fn balances(&self, user_id: u64) -> Result<Vec<Balance>> {
        select_rows(
            self.db,
            TABLE,
            &[Condition::eq("user_lot.user_id", user_id.to_string())],
        )?
        .iter()
        .map(|row| LedgerEntry::from_row(row).map(|entry| entry.balance()))
        .collect()
    }

    /// Write a fresh balance row without looking for an existing one
    pub fn open_account(&self, user_id: u64, lot_id: u64, quantity: f64) -> Result<u64> {
        Ok(self.db.insert(
            TABLE,
            &[user_id.to_string(), lot_id.to_string(), format_amount(quantity)],
        )?)
    }

    /// Add `delta` to the balance of (`user_id`, `lot_id`) and return the
    /// new quantity.
    ///
    /// The existing row is updated in place, or removed when the result is
    /// within epsilon of zero. A result below `-EPSILON` fails with
    /// [`ExchangeError::NegativeBalance`] and leaves the page untouched. A
    /// missing row is created for a credit; a debit against a missing row
    /// fails with [`ExchangeError::BalanceNotFound`].
    #[instrument(skip(self))]
    pub fn adjust(&self, user_id: u64, lot_id: u64, delta: f64) -> Result<f64> {
        if delta.abs() < EPSILON {
            return self.balance(user_id, lot_id);
        }

        let user = user_id.to_string();
        let lot = lot_id.to_string();
        let mut applied: Option<f64> = None;

        self.db
            .pages()
            .rewrite(TABLE, RewriteScope::FirstChange, |row: &[String]| -> Result<RowEdit> {
                if applied.is_some() || row.get(1) != Some(&user) || row.get(2) != Some(&lot) {
                    return Ok(RowEdit::Keep);
                }

                let entry = LedgerEntry::from_row(row)?;
                let updated = entry.quantity + delta;
                if updated < -EPSILON {
                    return Err(ExchangeError::NegativeBalance {
                        user_id,
                        lot_id,
                        balance: entry.quantity,
                        delta,
                    });
                }

                if updated < EPSILON {
                    applied = Some(0.0);
                    Ok(RowEdit::Remove)
                } else {
                    applied = Some(updated);
                    Ok(RowEdit::Update(vec![
                        row[0].clone(),
                        user.clone(),
                        lot.clone(),
                        format_amount(updated),
                    ]))
                }
            })?;

        match applied {
            Some(quantity) => {
                debug!(quantity, "Balance adjusted");
                Ok(quantity)
            }
            None if delta > 0.0 => {
                self.open_account(user_id, lot_id, delta)?;
                debug!(quantity = delta, "Balance row created");
                Ok(delta)
            }
            None => Err(ExchangeError::BalanceNotFound { user_id, lot_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::open_db;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_adjust_creates_updates_and_removes() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let ledger = Ledger::new(&db);

        assert_eq!(ledger.balance(1, 1).unwrap(), 0.0);
        assert_eq!(ledger.adjust(1, 1, 100.0).unwrap(), 100.0);
        assert_eq!(ledger.adjust(1, 1, -40.5).unwrap(), 59.5);
        assert_eq!(ledger.balance(1, 1).unwrap(), 59.5);

        assert_eq!(ledger.adjust(1, 1, -59.5).unwrap(), 0.0);
        assert!(ledger.balances(1).unwrap().is_empty());
        assert_eq!(db.pages().scan("user_lot").count(), 0);
    }

    #[test]
    fn test_adjust_touches_only_its_row() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let ledger = Ledger::new(&db);

        ledger.adjust(1, 1, 10.0).unwrap();
        ledger.adjust(1, 2, 20.0).unwrap();
        ledger.adjust(2, 1, 30.0).unwrap();
        ledger.adjust(1, 2, 5.0).unwrap();

        assert_eq!(
            ledger.balances(1).unwrap(),
            vec![
                Balance { lot_id: 1, quantity: 10.0 },
                Balance { lot_id: 2, quantity: 25.0 },
            ]
        );
        assert_eq!(ledger.balance(2, 1).unwrap(), 30.0);
    }

    #[test]
    fn test_adjust_rejects_overdraft() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let ledger = Ledger::new(&db);

        ledger.adjust(1, 1, 10.0).unwrap();
        assert_matches!(
            ledger.adjust(1, 1, -10.5),
            Err(ExchangeError::NegativeBalance { user_id: 1, lot_id: 1, .. })
        );
        assert_eq!(ledger.balance(1, 1).unwrap(), 10.0);

        assert_matches!(
            ledger.adjust(3, 1, -1.0),
            Err(ExchangeError::BalanceNotFound { user_id: 3, lot_id: 1 })
        );
    }

    #[test]
    fn test_final_quantity_is_sum_of_deltas() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let ledger = Ledger::new(&db);

        let deltas = [250.0, -100.0, 0.0000001, 12.345678, -62.345678, 300.0, -400.0];
        let mut expected = 0.0;
        for delta in deltas {
            ledger.adjust(7, 2, delta).unwrap();
            if delta.abs() >= EPSILON {
                expected += delta;
            }
        }
        assert!((ledger.balance(7, 2).unwrap() - expected).abs() < EPSILON);
        assert!(ledger.adjust(7, 2, -(expected + 1.0)).is_err());
        assert!((ledger.balance(7, 2).unwrap() - expected).abs() < EPSILON);
    }

    #[test]
    fn test_tiny_delta_is_noop() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let ledger = Ledger::new(&db);

        assert_eq!(ledger.adjust(1, 1, 1e-9).unwrap(), 0.0);
        assert_eq!(db.pages().scan("user_lot").count(), 0);
    }
}
