//! Errors raised while binding and serving

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    /// The listener could not be opened
    #[error("cannot listen on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The accept loop stopped on an I/O failure
    #[error("serving failed: {0}")]
    Io(#[from] io::Error),

    #[error("'{0}' is not a host:port address")]
    InvalidAddress(String),

    /// `run` was called while a previous run is still serving
    #[error("server is already serving")]
    AlreadyRunning,
}

impl ServerError {
    pub fn bind(address: impl Into<String>, source: io::Error) -> Self {
        Self::Bind {
            address: address.into(),
            source,
        }
    }
}
