//! Command action handlers.
//!
//! Individual handler functions for each bot command. Each handler receives a
//! [`CommandContext`](crate::commands::CommandContext), processes the command,
//! and returns the [`Reply`](crate::commands::Reply) to send.
//!
//! # Handler Pattern
//!
//! Handlers follow a consistent pattern:
//! 1. Validate the arguments, answering with an error reply when invalid
//! 2. Send a progress notice before any blocking server query
//! 3. Return exactly one final reply, the dispatcher sends it
//!
//! # Available Handlers
//!
//! - [`handle_exit`] - Acknowledge the shutdown
//! - [`handle_query`] - Query the server with the full query or the status ping
//! - [`handle_start_server`] - Launch the start script when the server is offline
//! - [`handle_help`] - Display the help document
//! - [`handle_set_channel`] - Restrict or unrestrict the response channel

mod exit;
mod help;
mod query;
mod set_channel;
mod start_server;

pub use crate::commands::actions::{
    exit::handle_exit, help::handle_help, query::handle_query, set_channel::handle_set_channel,
    start_server::handle_start_server,
};

#[cfg(test)]
pub mod test_utils {
    use std::sync::{Arc, Mutex as StdMutex};

    use tempfile::TempDir;
    use tokio::sync::Mutex;

    use crate::{
        commands::{MockChatSession, Reply},
        config::{ConfigOverrides, ConfigStore},
    };

    /// Replies recorded by [`recording_chat`], with their channel id.
    pub type SentReplies = Arc<StdMutex<Vec<(String, Reply)>>>;

    /// Chat mock recording every reply and knowing `channels`.
    pub fn recording_chat(channels: &[&str]) -> (MockChatSession, SentReplies) {
        let sent: SentReplies = Arc::new(StdMutex::new(Vec::new()));
        let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();

        let mut chat = MockChatSession::new();
        let recorder = Arc::clone(&sent);
        chat.expect_send_reply()
            .returning(move |channel_id: &str, reply: &Reply| {
                recorder
                    .lock()
                    .unwrap()
                    .push((channel_id.to_owned(), reply.clone()));
            });
        chat.expect_channel_names()
            .returning(move || channels.clone());

        (chat, sent)
    }

    /// Texts of the recorded replies, help documents excluded.
    pub fn sent_texts(sent: &SentReplies) -> Vec<String> {
        sent.lock()
            .unwrap()
            .iter()
            .filter_map(|(_, reply)| reply.as_text().map(str::to_owned))
            .collect()
    }

    /// Configuration store in a temporary directory.
    pub async fn config_store(dir: &TempDir, server: Option<&str>) -> Mutex<ConfigStore> {
        let overrides = ConfigOverrides {
            token: Some("T".to_owned()),
            server: server.map(str::to_owned),
            port: None,
        };
        let store = ConfigStore::generate(dir.path().join("config.json"), &overrides)
            .await
            .unwrap();
        Mutex::new(store)
    }
}
