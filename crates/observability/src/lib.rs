//! Observability for Lotbase
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for the HTTP server and the exchange
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("lotbase", LogFormat::Pretty)?;
//!
//! // Optional, only when a metrics port is configured
//! observability::metrics::init_metrics("0.0.0.0", 9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, ExchangeMetrics, RequestMetricsGuard, ServerMetrics};
