//! Matching engine error types
//!
//! Expected domain rejections (validation, auth, funds) are kept apart from
//! faults of the storage underneath so callers can map each to a status.

use storage::StorageError;
use thiserror::Error;

/// Errors that can occur while serving exchange operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Missing or malformed input
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Missing or unknown user key
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller may not act on the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Balance too small to lock the order amount
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: f64, available: f64 },

    /// A ledger adjustment would take a balance below zero
    #[error("Negative balance for user {user_id} lot {lot_id}: {balance} + {delta}")]
    NegativeBalance {
        user_id: u64,
        lot_id: u64,
        balance: f64,
        delta: f64,
    },

    /// Debit against a balance row that does not exist
    #[error("No balance row for user {user_id} lot {lot_id}")]
    BalanceNotFound { user_id: u64, lot_id: u64 },

    /// A stored row could not be decoded
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Fault outside the storage layer, e.g. a panicked worker
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<common::Error> for ExchangeError {
    fn from(err: common::Error) -> Self {
        match err {
            common::Error::InvalidInput(msg) => Self::Validation(msg),
            common::Error::NotFound(msg) => Self::NotFound(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl ExchangeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InsufficientFunds { .. } => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::NegativeBalance { .. }
            | Self::BalanceNotFound { .. }
            | Self::Corrupt(_)
            | Self::Internal(_)
            | Self::Storage(_) => 500,
        }
    }

    /// Short label for the rejection counter
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::NegativeBalance { .. } => "negative_balance",
            Self::BalanceNotFound { .. } => "balance_not_found",
            Self::Corrupt(_) => "corrupt",
            Self::Internal(_) => "internal",
            Self::Storage(_) => "storage",
        }
    }

    /// True for rejections caused by the request rather than a fault
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
