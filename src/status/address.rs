//! Server address parsing.
//!
//! Users can point a query at any server with `host` or `host:port`. The
//! configured server is stored the same way, split in host and port.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Default Minecraft server port.
pub const DEFAULT_PORT: u16 = 25565;

/// A server target, `host` plus `port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    /// Host name or IPv4 address
    pub host: String,
    /// TCP/UDP port
    pub port: u16,
}

/// Errors raised when an address argument is malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("missing host")]
    MissingHost,
    #[error("invalid port `{0}`")]
    InvalidPort(String),
    #[error("too many `:` separators")]
    TooManySeparators,
}

impl ServerAddress {
    /// Create a new [`ServerAddress`].
    pub fn new(host: &str, port: u16) -> Self {
        ServerAddress {
            host: host.to_owned(),
            port,
        }
    }
}

impl FromStr for ServerAddress {
    type Err = AddressError;

    /// Parses `host` or `host:port`, the port defaults to [`DEFAULT_PORT`].
    ///
    /// IPv6 literals are rejected, they contain more than one `:`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let mut parts = value.split(':');

        let host = parts.next().unwrap_or_default();
        if host.is_empty() {
            return Err(AddressError::MissingHost);
        }

        let port = match parts.next() {
            None => DEFAULT_PORT,
            Some(port) => port
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| AddressError::InvalidPort(port.to_owned()))?,
        };

        if parts.next().is_some() {
            return Err(AddressError::TooManySeparators);
        }

        Ok(ServerAddress::new(host, port))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
