//! HTTP surface, driven through the router with `oneshot`

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use matching_engine::api::{create_router, ExchangeState};
use matching_engine::Exchange;
use serde_json::{json, Value};
use storage::Database;
use tempfile::TempDir;
use tower::ServiceExt;

fn app(dir: &TempDir) -> Router {
    let db = Database::open(dir.path(), &config::generate_default_schema()).unwrap();
    let exchange = Exchange::new(db, 1000.0);
    exchange.bootstrap(&["BTC", "RUB"]).unwrap();
    create_router(ExchangeState::new(exchange))
}

async fn send(app: &Router, method: &str, uri: &str, key: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        request = request.header("X-USER-KEY", key);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, name: &str) -> String {
    let (status, body) = send(app, "POST", "/user", None, Some(json!({ "username": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["key"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_listings() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, lots) = send(&app, "GET", "/lot", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lots, json!([{ "lot_id": 1, "name": "BTC" }, { "lot_id": 2, "name": "RUB" }]));

    let (_, pairs) = send(&app, "GET", "/pair", None, None).await;
    assert_eq!(pairs, json!([{ "pair_id": 1, "sale_lot_id": 1, "buy_lot_id": 2 }]));
}

#[tokio::test]
async fn test_create_user_and_balance() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let key = register(&app, "alice").await;
    let (status, balance) = send(&app, "GET", "/balance", Some(&key), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        balance,
        json!([{ "lot_id": 1, "quantity": 1000.0 }, { "lot_id": 2, "quantity": 1000.0 }])
    );

    let (status, _) = send(&app, "POST", "/user", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/balance", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "GET", "/balance", Some("unknown"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_lifecycle() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let seller = register(&app, "seller").await;
    let buyer = register(&app, "buyer").await;

    let (status, body) = send(
        &app,
        "POST",
        "/order",
        Some(&seller),
        Some(json!({ "pair_id": 1, "quantity": 10.0, "price": 100.0, "type": "sell" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let sell_id = body["order_id"].as_u64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        "/order",
        Some(&buyer),
        Some(json!({ "pair_id": 1, "quantity": 4.0, "price": 100.0, "type": "buy" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, orders) = send(&app, "GET", "/order", None, None).await;
    let orders = orders.as_array().unwrap().clone();
    assert_eq!(orders.len(), 3);
    let resting = orders.iter().find(|o| o["order_id"] == json!(sell_id)).unwrap();
    assert_eq!(resting["quantity"], json!(6.0));
    assert_eq!(resting["closed"], json!(""));
    assert_eq!(resting["type"], json!("sell"));

    let (status, _) = send(&app, "DELETE", "/order", Some(&buyer), Some(json!({ "order_id": sell_id }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "DELETE", "/order", Some(&seller), Some(json!({ "order_id": sell_id }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], json!(sell_id));

    let (_, balance) = send(&app, "GET", "/balance", Some(&seller), None).await;
    assert_eq!(
        balance,
        json!([{ "lot_id": 1, "quantity": 996.0 }, { "lot_id": 2, "quantity": 1400.0 }])
    );

    let (status, _) = send(&app, "DELETE", "/order", Some(&seller), Some(json!({ "order_id": sell_id }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_partial_fill_returns_cancellable_remainder() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let seller = register(&app, "seller").await;
    let buyer = register(&app, "buyer").await;

    send(
        &app,
        "POST",
        "/order",
        Some(&seller),
        Some(json!({ "pair_id": 1, "quantity": 3.0, "price": 100.0, "type": "sell" })),
    )
    .await;
    let (status, body) = send(
        &app,
        "POST",
        "/order",
        Some(&buyer),
        Some(json!({ "pair_id": 1, "quantity": 8.0, "price": 100.0, "type": "buy" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let buy_id = body["order_id"].as_u64().unwrap();

    let (_, orders) = send(&app, "GET", "/order", None, None).await;
    let remainder = orders
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["order_id"] == json!(buy_id))
        .unwrap()
        .clone();
    assert_eq!(remainder["quantity"], json!(5.0));
    assert_eq!(remainder["closed"], json!(""));

    let (status, body) = send(&app, "DELETE", "/order", Some(&buyer), Some(json!({ "order_id": buy_id }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], json!(buy_id));
}

#[tokio::test]
async fn test_order_rejections() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let key = register(&app, "carol").await;

    let order = |body: Value| {
        let app = app.clone();
        let key = key.clone();
        async move { send(&app, "POST", "/order", Some(&key), Some(body)).await }
    };

    let (status, _) = order(json!({ "pair_id": 1, "quantity": 1.0, "price": 1.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = order(json!({ "pair_id": 1, "quantity": 1.0, "price": 1.0, "type": "hold" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = order(json!({ "pair_id": 1, "quantity": -1.0, "price": 1.0, "type": "buy" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = order(json!({ "pair_id": 9, "quantity": 1.0, "price": 1.0, "type": "buy" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = order(json!({ "pair_id": 1, "quantity": 50.0, "price": 50.0, "type": "buy" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["requested"], json!(2500.0));
    assert_eq!(body["available"], json!(1000.0));

    let (status, _) = send(
        &app,
        "POST",
        "/order",
        None,
        Some(json!({ "pair_id": 1, "quantity": 1.0, "price": 1.0, "type": "buy" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/order")
        .header("X-USER-KEY", key.as_str())
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
