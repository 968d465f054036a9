//! Error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::ExchangeError;

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self {
            ExchangeError::InsufficientFunds {
                requested,
                available,
            } => json!({
                "error": self.to_string(),
                "code": self.reason(),
                "requested": requested,
                "available": available,
            }),
            // details stay in the log
            err if !err.is_client_error() => json!({
                "error": "Internal server error",
                "code": err.reason(),
            }),
            err => json!({
                "error": err.to_string(),
                "code": err.reason(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
