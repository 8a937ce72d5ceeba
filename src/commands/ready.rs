//! Initialization notice sent when a connection is established.
//!
//! A [`ReadyNotice`] lives for one connection. The bot creates a fresh one
//! for every sync run, so a reconnection announces again while a repeated
//! ready hook within the same connection stays silent.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::commands::{ChatSession, Reply, markdown_response::format_init_success};

/// Per-connection guard of the initialization notice.
#[derive(Debug, Default)]
pub struct ReadyNotice {
    sent: AtomicBool,
}

impl ReadyNotice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends the initialization notice to the restricted channel.
    ///
    /// `room_for_channel` maps a channel name to the id of a joined channel.
    /// Nothing is sent when no channel is restricted, when the channel is not
    /// joined, or when this connection already announced itself.
    ///
    /// Returns `true` when the notice was sent.
    pub async fn announce<C, F>(&self, chat: &C, restricted_channel: &str, room_for_channel: F) -> bool
    where
        C: ChatSession,
        F: FnOnce(&str) -> Option<String>,
    {
        if restricted_channel.is_empty() {
            info!("ready, accepting commands from every room");
            return false;
        }

        let Some(channel_id) = room_for_channel(restricted_channel) else {
            warn!("restricted room '{}' is not joined", restricted_channel);
            return false;
        };

        if self.sent.swap(true, Ordering::SeqCst) {
            debug!("initialization notice already sent on this connection");
            return false;
        }

        info!("ready, restricted to '{}'", restricted_channel);
        chat.send_reply(&channel_id, &Reply::Text(format_init_success()))
            .await;
        true
    }
}
