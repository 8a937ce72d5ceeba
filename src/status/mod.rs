//! Minecraft server status integration.
//!
//! This module talks to a remote Minecraft server and normalizes what it
//! answers into a single [`QueryResult`] shape.
//!
//! # Modules
//!
//! - `address` - `host[:port]` parsing for the configured and ad-hoc targets
//! - `protocol` - Packet encoding and decoding for both query mechanisms
//! - `client` - Async network client issuing the queries with a timeout
//!
//! # Query mechanisms
//!
//! | Mode | Transport | Players |
//! |------|-----------|---------|
//! | [`QueryMode::Full`] | UDP query protocol (`enable-query=true`) | exact name list |
//! | [`QueryMode::Status`] | TCP server list ping | optional sample |
//!
//! # Examples
//!
//! ```no_run
//! use mcqbot::status::{MinecraftStatusClient, QueryMode, ServerAddress, StatusRequester};
//!
//! # async fn example() -> Result<(), mcqbot::status::QueryError> {
//! let client = MinecraftStatusClient::new();
//! let address: ServerAddress = "play.example.com:25565".parse().unwrap();
//! let result = client.query(&address, QueryMode::Status).await?;
//! println!("{}/{} players", result.current_players, result.max_players);
//! # Ok(())
//! # }
//! ```

mod address;
mod client;
mod protocol;

use thiserror::Error;

pub use crate::status::address::{AddressError, DEFAULT_PORT, ServerAddress};
#[cfg(test)]
pub use crate::status::client::MockStatusRequester;
pub use crate::status::client::{MinecraftStatusClient, StatusRequester};

/// Which of the two status mechanisms to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Full query over UDP, returns every online player name.
    ///
    /// Requires `enable-query=true` in the server's `server.properties`.
    Full,
    /// Lightweight server list ping over TCP, returns at most a sample of names.
    Status,
}

/// Normalized answer of a status query.
///
/// Both mechanisms map to this shape. With [`QueryMode::Status`] the
/// `sample_names` may be a strict subset of the online players.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    /// Whether the server answered
    pub online: bool,
    /// Number of players currently connected
    pub current_players: u32,
    /// Maximum number of players
    pub max_players: u32,
    /// Player names, in the order the server returned them
    pub sample_names: Vec<String>,
    /// Server version string, when the server reports one
    pub version: Option<String>,
}

/// Errors raised while querying a server.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No answer within the client timeout.
    ///
    /// For a full query this usually means `enable-query` is disabled, for a
    /// status ping that the server is offline.
    #[error("query timed out")]
    Timeout,
    /// The host could not be resolved or the connection failed.
    #[error("server unreachable: {0}")]
    Unreachable(#[from] std::io::Error),
    /// The server answered with something that is not a valid response.
    #[error("malformed response: {0}")]
    Protocol(String),
}
