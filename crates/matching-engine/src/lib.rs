//! Lotbase exchange engine
//!
//! A two-asset spot exchange built on the `storage` crate. Balances live in
//! the `user_lot` table, orders in `order`; placing an order locks the
//! funds it could spend, matches it against resting orders of the other
//! side and records executed slices as closed order rows.
//!
//! # Modules
//!
//! - [`domain`] - Row types (users, lots, pairs, balances, orders)
//! - [`store`] - Ledger and order mutators over page rewrites
//! - [`matching`] - Candidate selection and execution pricing
//! - [`engine`] - The [`Exchange`] operations
//! - `api` - axum HTTP surface (feature `api`)

pub mod domain;
pub mod engine;
pub mod error;
pub mod matching;
pub mod result;
pub mod store;

#[cfg(feature = "api")]
pub mod api;

pub use domain::{Balance, Lot, NewOrder, Order, OrderRecord, Pair, User};
pub use engine::Exchange;
pub use error::ExchangeError;
pub use result::{Fill, Placement};
pub use store::{Ledger, OrderStore};

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;
