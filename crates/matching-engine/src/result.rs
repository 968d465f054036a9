//! Result types for order placement

use common::EPSILON;

/// One executed slice against a resting order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub resting_order_id: u64,
    /// Owner of the resting order
    pub counterparty_id: u64,
    pub quantity: f64,
    pub price: f64,
}

impl Fill {
    /// Currency amount that changed hands
    pub fn value(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Outcome of placing an order
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Key of the open remainder when one rests on the book, otherwise of
    /// the single row recording the order
    pub order_id: u64,
    /// Slices executed, in matching order
    pub fills: Vec<Fill>,
    /// Quantity left open on the book
    pub remaining: f64,
}

impl Placement {
    /// Check if any trades were generated
    pub fn has_trades(&self) -> bool {
        !self.fills.is_empty()
    }

    /// Total quantity filled
    pub fn filled_quantity(&self) -> f64 {
        self.fills.iter().map(|f| f.quantity).sum()
    }

    /// Total currency amount exchanged
    pub fn filled_value(&self) -> f64 {
        self.fills.iter().map(Fill::value).sum()
    }

    /// Volume-weighted execution price, None without fills
    pub fn average_price(&self) -> Option<f64> {
        let filled = self.filled_quantity();
        (filled > EPSILON).then(|| self.filled_value() / filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_price() {
        let placement = Placement {
            order_id: 3,
            fills: vec![
                Fill { resting_order_id: 1, counterparty_id: 2, quantity: 1.0, price: 99.0 },
                Fill { resting_order_id: 2, counterparty_id: 2, quantity: 3.0, price: 103.0 },
            ],
            remaining: 0.0,
        };
        assert_eq!(placement.filled_quantity(), 4.0);
        assert_eq!(placement.filled_value(), 408.0);
        assert_eq!(placement.average_price(), Some(102.0));
        assert!(placement.has_trades());

        let resting = Placement { order_id: 1, fills: vec![], remaining: 5.0 };
        assert!(!resting.has_trades());
        assert_eq!(resting.average_price(), None);
    }
}
