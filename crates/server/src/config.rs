//! Server configuration

use crate::error::{Result, ServerError};
use std::net::SocketAddr;

/// Default HTTP port of the exchange
pub const DEFAULT_HTTP_PORT: u16 = 7432;

/// Where the HTTP server binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    /// `0` asks the OS for an ephemeral port
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::http_only("127.0.0.1", DEFAULT_HTTP_PORT)
    }
}

impl ServerConfig {
    pub fn http_only(host: impl Into<String>, http_port: u16) -> Self {
        Self {
            host: host.into(),
            http_port,
        }
    }

    /// Parse a `host:port` pair, mapping `localhost` onto the loopback
    /// address
    pub fn from_address(address: &str) -> Result<Self> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| ServerError::InvalidAddress(address.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ServerError::InvalidAddress(address.to_string()))?;
        let host = if host == "localhost" { "127.0.0.1" } else { host };
        Ok(Self::http_only(host, port))
    }

    /// Socket address to bind
    pub fn http_addr(&self) -> Result<SocketAddr> {
        let raw = format!("{}:{}", self.host, self.http_port);
        raw.parse().map_err(|_| ServerError::InvalidAddress(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_addr() {
        let config = ServerConfig::http_only("0.0.0.0", 8080);
        assert_eq!(config.http_addr().unwrap().port(), 8080);

        let bad = ServerConfig::http_only("not a host", 8080);
        assert!(matches!(bad.http_addr(), Err(ServerError::InvalidAddress(_))));
    }

    #[test]
    fn test_from_address() {
        let config = ServerConfig::from_address("localhost:7000").unwrap();
        assert_eq!(config, ServerConfig::http_only("127.0.0.1", 7000));

        assert!(ServerConfig::from_address("127.0.0.1").is_err());
        assert!(ServerConfig::from_address("127.0.0.1:http").is_err());
        assert_eq!(ServerConfig::default().http_port, DEFAULT_HTTP_PORT);
    }
}
