//! Common types used across Lotbase
//!
//! This module provides the fundamental domain types shared by the
//! storage layer, the matching engine and the HTTP surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Tolerance used for every balance and quantity comparison
pub const EPSILON: f64 = 1e-6;

/// Number of fractional digits persisted for amounts and prices
pub const AMOUNT_DECIMALS: usize = 6;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Returns true if this is a buy order
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    /// Lowercase wire name, as persisted in the order table
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(Error::invalid_input(format!(
                "order type must be 'buy' or 'sell', got '{}'",
                other
            ))),
        }
    }
}

/// Format an amount the way it is persisted (six fractional digits)
pub fn format_amount(value: f64) -> String {
    format!("{:.*}", AMOUNT_DECIMALS, value)
}

/// Parse a persisted amount
pub fn parse_amount(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::invalid_input(format!("not a number: '{}'", raw)))
}

/// Strip characters that would break the CSV row layout.
///
/// Commas and single quotes are dropped outright, line breaks too.
pub fn sanitize_value(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ',' | '\'' | '\r' | '\n'))
        .collect()
}

/// Current time as Unix seconds, the format of the `closed` column
pub fn unix_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// Generate a fresh 32-character alphanumeric user key
pub fn generate_user_key() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
        assert!(Side::Buy.is_buy());
        assert!(!Side::Sell.is_buy());
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
        assert_eq!(Side::Buy.to_string(), "buy");
    }

    #[test]
    fn test_amount_format() {
        assert_eq!(format_amount(1000.0), "1000.000000");
        assert_eq!(format_amount(0.5), "0.500000");
        assert_eq!(parse_amount(" 12.5 ").unwrap(), 12.5);
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_sanitize_value() {
        assert_eq!(sanitize_value("o'brien, jr\n"), "obrien jr");
        assert_eq!(sanitize_value("plain"), "plain");
    }

    #[test]
    fn test_user_key() {
        let key = generate_user_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(key, generate_user_key());
    }
}
