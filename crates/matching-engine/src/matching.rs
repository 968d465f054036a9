//! Candidate selection for an incoming order
//!
//! Only resting orders on the opposite side, owned by someone else, with
//! quantity left and a price inside the incoming limit are viable. An
//! incoming buy takes the cheapest sellers first. An incoming sell takes
//! buyers in table order without re-sorting by price.

use common::{Side, EPSILON};

use crate::domain::Order;

/// Whether `resting` may trade against an order on `side` limited at
/// `limit` from `user_id`
pub fn is_viable(side: Side, limit: f64, user_id: u64, resting: &Order) -> bool {
    if !resting.is_open()
        || resting.side != side.opposite()
        || resting.user_id == user_id
        || resting.quantity <= EPSILON
    {
        return false;
    }
    match side {
        Side::Buy => resting.price <= limit + EPSILON,
        Side::Sell => resting.price >= limit - EPSILON,
    }
}

/// Viable resting orders in the order they are consumed
pub fn candidates(side: Side, limit: f64, user_id: u64, resting: Vec<Order>) -> Vec<Order> {
    let mut viable: Vec<Order> = resting
        .into_iter()
        .filter(|order| is_viable(side, limit, user_id, order))
        .collect();

    if side.is_buy() {
        viable.sort_by(|a, b| a.price.total_cmp(&b.price));
    }
    viable
}

/// Price a slice executes at: the resting price when the incoming order
/// buys, the incoming limit when it sells
pub fn execution_price(side: Side, limit: f64, resting_price: f64) -> f64 {
    match side {
        Side::Buy => resting_price,
        Side::Sell => limit,
    }
}
