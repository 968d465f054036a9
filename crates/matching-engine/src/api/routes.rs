//! HTTP routes for the exchange API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::*;

/// Create the exchange router
///
/// Routes:
/// - POST   /user    - Register a user, returns its key
/// - GET    /lot     - List lots
/// - GET    /pair    - List pairs
/// - GET    /balance - Caller's balances (`X-USER-KEY`)
/// - POST   /order   - Place an order (`X-USER-KEY`), returns an order id
///   that stays cancellable while any quantity rests (see [`create_order`])
/// - GET    /order   - List all orders
/// - DELETE /order   - Cancel an open order (`X-USER-KEY`)
/// - GET    /health  - Health check
pub fn create_router(state: ExchangeState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/user", post(create_user))
        .route("/lot", get(get_lots))
        .route("/pair", get(get_pairs))
        .route("/balance", get(get_balance))
        .route(
            "/order",
            post(create_order).get(get_orders).delete(delete_order),
        )
        .with_state(state)
}
