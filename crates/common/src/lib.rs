//! Common types and utilities for Lotbase
//!
//! This crate provides shared types and helpers used across
//! all Lotbase crates.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain types (Side, amounts, timestamps, user keys)

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
