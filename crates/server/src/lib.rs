//! Server infrastructure for Lotbase
//!
//! The exchange is served over HTTP only. [`HttpServer`] implements the
//! [`Server`] trait; [`ServerExt`] adds `spawn()` and `run_with_ctrl_c()`.
//!
//! Shutdown is a `CancellationToken` from `tokio_util`;
//! [`cancel_on_signal`] hands out one that fires on Ctrl+C or SIGTERM.
//!
//! # Quick Start
//!
//! ```ignore
//! use server::{HttpServer, ServerConfig, ServerExt};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_address("127.0.0.1:7432")?;
//!     let server = HttpServer::new(config, router);
//!
//!     // Run with Ctrl+C handling
//!     server.run_with_ctrl_c().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod shutdown;
pub mod traits;

pub use config::{ServerConfig, DEFAULT_HTTP_PORT};
pub use error::{Result, ServerError};
pub use http::HttpServer;
pub use shutdown::cancel_on_signal;
pub use traits::{Server, ServerExt};
