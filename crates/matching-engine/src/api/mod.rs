//! HTTP API for the exchange

pub mod error;
pub mod handlers;
pub mod routes;

pub use handlers::ExchangeState;
pub use routes::create_router;
