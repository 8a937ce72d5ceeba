//! Matrix protocol integration for the bot.
//!
//! This module implements the chat side of the bot on top of `matrix-sdk`:
//! - Session restoration from an access token
//! - Real-time event synchronization with invite auto-join
//! - Markdown replies, channel names and power-level roles
//!
//! # Architecture
//!
//! The module is structured around the [`MatrixClient`] which coordinates:
//! - **Client**: Session restoration and the [`ChatSession`](crate::commands::ChatSession)
//!   implementation consumed by the dispatcher
//! - **Sync**: Real-time event handling and the ready hook via the sync submodule
//!
//! # Channels
//!
//! A joined room is a channel. Its name is the `m.room.name`, else the
//! localpart of the canonical alias, else the room id.
//!
//! # Examples
//!
//! ```no_run
//! use mcqbot::matrix::{MatrixClient, SessionCredentials};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let credentials = SessionCredentials {
//!     user_id: "@mcqbot:example.com".to_string(),
//!     device_id: "MCQBOT".to_string(),
//!     access_token: "syt_token".to_string(),
//! };
//!
//! let client = MatrixClient::new(&credentials, "./session").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod sync;

pub use crate::matrix::client::MatrixClient;
pub use crate::matrix::sync::RoomMessage;

/// Credentials of an existing Matrix session.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    /// User ID of the matrix account
    pub user_id: String,
    /// Device the access token was issued for
    pub device_id: String,
    /// Access token of the session
    pub access_token: String,
}
