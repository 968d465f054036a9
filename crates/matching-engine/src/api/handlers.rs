//! HTTP API handlers for the exchange
//!
//! Storage work is blocking file I/O, so every handler hands it to
//! `spawn_blocking` and takes the exchange mutex there.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use common::Side;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::{Balance, Lot, NewOrder, Order, Pair};
use crate::engine::Exchange;
use crate::error::ExchangeError;
use crate::Result;

/// Header carrying the caller's key
pub const USER_KEY_HEADER: &str = "X-USER-KEY";

/// Shared exchange behind the process-wide request mutex
#[derive(Clone)]
pub struct ExchangeState {
    exchange: Arc<Mutex<Exchange>>,
}

impl ExchangeState {
    pub fn new(exchange: Exchange) -> Self {
        Self {
            exchange: Arc::new(Mutex::new(exchange)),
        }
    }

    /// Run `op` on a blocking worker with the exchange locked
    pub async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Exchange) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let exchange = Arc::clone(&self.exchange);
        tokio::task::spawn_blocking(move || {
            let guard = exchange.lock();
            op(&guard)
        })
        .await
        .map_err(|e| ExchangeError::Internal(format!("worker failed: {}", e)))?
    }
}

fn user_key(headers: &HeaderMap) -> String {
    headers
        .get(USER_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ExchangeError::validation(rejection.body_text()))
}

/// Request to register a user
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub key: String,
}

/// Request to place an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub pair_id: Option<u64>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    #[serde(rename = "type")]
    pub side: Option<String>,
}

impl CreateOrderRequest {
    pub fn into_new_order(self) -> Result<NewOrder> {
        let (Some(pair_id), Some(quantity), Some(price), Some(side)) =
            (self.pair_id, self.quantity, self.price, self.side)
        else {
            return Err(ExchangeError::validation(
                "pair_id, quantity, price and type are required",
            ));
        };
        Ok(NewOrder {
            pair_id,
            quantity,
            price,
            side: side.parse::<Side>()?,
        })
    }
}

/// Request to cancel an order
#[derive(Debug, Deserialize)]
pub struct DeleteOrderRequest {
    pub order_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct OrderIdResponse {
    pub order_id: u64,
}

/// Health check
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /user
pub async fn create_user(
    State(state): State<ExchangeState>,
    payload: std::result::Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>)> {
    let username = body(payload)?.username.unwrap_or_default();
    let key = state.run(move |ex| ex.create_user(&username)).await?;
    Ok((StatusCode::CREATED, Json(CreateUserResponse { key })))
}

/// GET /lot
pub async fn get_lots(State(state): State<ExchangeState>) -> Result<Json<Vec<Lot>>> {
    Ok(Json(state.run(|ex| ex.lots()).await?))
}

/// GET /pair
pub async fn get_pairs(State(state): State<ExchangeState>) -> Result<Json<Vec<Pair>>> {
    Ok(Json(state.run(|ex| ex.pairs()).await?))
}

/// GET /balance
pub async fn get_balance(
    State(state): State<ExchangeState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Balance>>> {
    let key = user_key(&headers);
    Ok(Json(state.run(move |ex| ex.balance(&key)).await?))
}

/// POST /order
///
/// Responds `201` with `{"order_id": n}`. Which row `n` names depends on
/// how the order matched:
/// - partial fill: the open remainder, so `DELETE /order` can cancel it
///   (the settled part is a separate closed row)
/// - full fill: the settled row
/// - no fill: the resting row
pub async fn create_order(
    State(state): State<ExchangeState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderIdResponse>)> {
    let key = user_key(&headers);
    let order = body(payload)?.into_new_order()?;
    let placement = state.run(move |ex| ex.create_order(&key, &order)).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderIdResponse {
            order_id: placement.order_id,
        }),
    ))
}

/// GET /order
pub async fn get_orders(State(state): State<ExchangeState>) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.run(|ex| ex.all_orders()).await?))
}

/// DELETE /order
pub async fn delete_order(
    State(state): State<ExchangeState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<DeleteOrderRequest>, JsonRejection>,
) -> Result<Json<OrderIdResponse>> {
    let key = user_key(&headers);
    let order_id = body(payload)?
        .order_id
        .ok_or_else(|| ExchangeError::validation("order_id is required"))?;
    let order_id = state.run(move |ex| ex.delete_order(&key, order_id)).await?;
    Ok(Json(OrderIdResponse { order_id }))
}
