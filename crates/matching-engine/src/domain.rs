//! Domain types for the exchange
//!
//! Every entity is a plain row in the page store. The types here decode
//! those rows (primary key first, then the schema columns in order) and
//! carry the field names the HTTP surface exposes.

use common::{format_amount, parse_amount, Side};
use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;
use crate::Result;

fn field<'a>(row: &'a [String], idx: usize, table: &str) -> Result<&'a str> {
    row.get(idx)
        .map(String::as_str)
        .ok_or_else(|| ExchangeError::Corrupt(format!("{} row has no column {}", table, idx)))
}

/// Decode a key column
pub fn parse_id(raw: &str, what: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ExchangeError::Corrupt(format!("invalid {} '{}'", what, raw)))
}

fn amount(raw: &str, what: &str) -> Result<f64> {
    parse_amount(raw).map_err(|_| ExchangeError::Corrupt(format!("invalid {} '{}'", what, raw)))
}

// ============================================================================
// User
// ============================================================================

/// Registered exchange user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub key: String,
}

impl User {
    pub fn from_row(row: &[String]) -> Result<Self> {
        Ok(Self {
            id: parse_id(field(row, 0, "user")?, "user_id")?,
            username: field(row, 1, "user")?.to_string(),
            key: field(row, 2, "user")?.to_string(),
        })
    }
}

// ============================================================================
// Lot & Pair
// ============================================================================

/// Tradable asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    #[serde(rename = "lot_id")]
    pub id: u64,
    pub name: String,
}

impl Lot {
    pub fn from_row(row: &[String]) -> Result<Self> {
        Ok(Self {
            id: parse_id(field(row, 0, "lot")?, "lot_id")?,
            name: field(row, 1, "lot")?.to_string(),
        })
    }
}

/// Two lots traded against each other
///
/// `first` is the asset being bought or sold, `second` the currency it is
/// priced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    #[serde(rename = "pair_id")]
    pub id: u64,
    #[serde(rename = "sale_lot_id")]
    pub first: u64,
    #[serde(rename = "buy_lot_id")]
    pub second: u64,
}

impl Pair {
    pub fn from_row(row: &[String]) -> Result<Self> {
        Ok(Self {
            id: parse_id(field(row, 0, "pair")?, "pair_id")?,
            first: parse_id(field(row, 1, "pair")?, "first_lot_id")?,
            second: parse_id(field(row, 2, "pair")?, "second_lot_id")?,
        })
    }

    /// Lot delivered to the buyer
    pub fn asset(&self) -> u64 {
        self.first
    }

    /// Lot paid by the buyer
    pub fn currency(&self) -> u64 {
        self.second
    }
}

// ============================================================================
// Balance
// ============================================================================

/// One ledger row as seen by its owner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub lot_id: u64,
    pub quantity: f64,
}

/// Full ledger row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerEntry {
    pub id: u64,
    pub user_id: u64,
    pub lot_id: u64,
    pub quantity: f64,
}

impl LedgerEntry {
    pub fn from_row(row: &[String]) -> Result<Self> {
        Ok(Self {
            id: parse_id(field(row, 0, "user_lot")?, "user_lot_id")?,
            user_id: parse_id(field(row, 1, "user_lot")?, "user_id")?,
            lot_id: parse_id(field(row, 2, "user_lot")?, "lot_id")?,
            quantity: amount(field(row, 3, "user_lot")?, "quantity")?,
        })
    }

    pub fn balance(&self) -> Balance {
        Balance {
            lot_id: self.lot_id,
            quantity: self.quantity,
        }
    }
}

// ============================================================================
// Order
// ============================================================================

/// Stored order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "order_id")]
    pub id: u64,
    pub user_id: u64,
    pub pair_id: u64,
    pub quantity: f64,
    pub price: f64,
    #[serde(rename = "type")]
    pub side: Side,
    /// Empty while open, Unix timestamp once closed
    pub closed: String,
}

impl Order {
    pub fn from_row(row: &[String]) -> Result<Self> {
        let side = field(row, 5, "order")?
            .parse::<Side>()
            .map_err(|e| ExchangeError::Corrupt(e.to_string()))?;
        Ok(Self {
            id: parse_id(field(row, 0, "order")?, "order_id")?,
            user_id: parse_id(field(row, 1, "order")?, "user_id")?,
            pair_id: parse_id(field(row, 2, "order")?, "pair_id")?,
            quantity: amount(field(row, 3, "order")?, "quantity")?,
            price: amount(field(row, 4, "order")?, "price")?,
            side,
            closed: row.get(6).map(|c| c.trim().to_string()).unwrap_or_default(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.closed.is_empty()
    }

    /// Funds held while the order rests: currency for a buy, asset for a
    /// sell
    pub fn locked_amount(&self) -> f64 {
        match self.side {
            Side::Buy => self.quantity * self.price,
            Side::Sell => self.quantity,
        }
    }

    /// Lot the locked funds are drawn from
    pub fn locked_lot(&self, pair: &Pair) -> u64 {
        match self.side {
            Side::Buy => pair.currency(),
            Side::Sell => pair.asset(),
        }
    }
}

/// Order row about to be written; its key is assigned on insert
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub user_id: u64,
    pub pair_id: u64,
    pub quantity: f64,
    pub price: f64,
    pub side: Side,
    pub closed: Option<String>,
}

impl OrderRecord {
    pub fn open(user_id: u64, pair_id: u64, side: Side, quantity: f64, price: f64) -> Self {
        Self {
            user_id,
            pair_id,
            quantity,
            price,
            side,
            closed: None,
        }
    }

    /// Already settled slice, closed at `timestamp`
    pub fn settled(
        user_id: u64,
        pair_id: u64,
        side: Side,
        quantity: f64,
        price: f64,
        timestamp: &str,
    ) -> Self {
        Self {
            closed: Some(timestamp.to_string()),
            ..Self::open(user_id, pair_id, side, quantity, price)
        }
    }

    /// Column values in schema order
    pub fn values(&self) -> Vec<String> {
        vec![
            self.user_id.to_string(),
            self.pair_id.to_string(),
            format_amount(self.quantity),
            format_amount(self.price),
            self.side.to_string(),
            self.closed.clone().unwrap_or_default(),
        ]
    }
}

/// Validated order request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewOrder {
    pub pair_id: u64,
    pub quantity: f64,
    pub price: f64,
    pub side: Side,
}

impl NewOrder {
    /// Amount locked up front: `quantity * price` of the currency for a
    /// buy, `quantity` of the asset for a sell
    pub fn lock_amount(&self) -> f64 {
        match self.side {
            Side::Buy => self.quantity * self.price,
            Side::Sell => self.quantity,
        }
    }
}
