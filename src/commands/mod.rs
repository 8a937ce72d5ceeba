//! Bot command parsing, dispatching and response formatting.
//!
//! This module decides, for one inbound chat message, which action to take and
//! produces the replies sent back to the channel.
//!
//! # Overview
//!
//! 1. **Prefix filter** - messages not starting with `mc!` are ignored
//! 2. **Channel filter** - when a response channel is configured, messages from
//!    other channels are ignored
//! 3. **Tokenize** - `mc!<command> <rest>`
//! 4. **Match** - the [`command`] table resolves the command, manager-only rows
//!    are skipped when the caller lacks the `Bot Manager` role
//! 5. **Execute** - the [`actions`] handlers produce exactly one reply
//!
//! # Architecture
//!
//! ```text
//! InboundMessage
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Dispatcher  │  ← Entry point: dispatch()
//! └─────────────┘
//!      │
//!      ├── command::tokenize() + command::resolve()
//!      │
//!      └── Action Handlers
//!           - handle_query        (status client)
//!           - handle_start_server (status client + start script)
//!           - handle_set_channel  (configuration store)
//!           - handle_help
//!           - handle_exit
//!                │
//!                ▼
//!          ChatSession::send_reply()
//! ```
//!
//! # Available Commands
//!
//! | Command | Match | Role | Description |
//! |---------|-------|------|-------------|
//! | `exit` | exact | `Bot Manager` | Acknowledge and stop the bot |
//! | `query`, `status` | contains | - | Query the server, `[host[:port]]` |
//! | `start-server`, `start` | exact | - | Run `start.sh` if the server is offline |
//! | `help` | exact | - | Show the help document |
//! | `set-channel` | contains | `Bot Manager` | `<channel>` or `~` for all channels |
//!
//! Privileged commands called without the role fall through to "command not
//! recognized", the bot never confirms they exist.
//!
//! # Module Organization
//!
//! - [`authorization`] - Role sets and the authorization predicate
//! - [`command`] - Tokenizer and matching table
//! - [`dispatcher`] - Orchestrates filtering, matching and execution
//! - [`actions`] - Individual command handler implementations
//! - [`markdown_response`] - Response formatting utilities
//! - [`ready`] - Initialization notice, once per connection

use mockall::automock;
use tokio::sync::Mutex;

use crate::config::ConfigStore;

pub mod authorization;
pub mod command;

mod actions;
mod dispatcher;
mod markdown_response;
mod ready;

pub use crate::commands::authorization::RoleSet;
pub use crate::commands::command::COMMAND_PREFIX;
pub use crate::commands::dispatcher::Dispatcher;
pub use crate::commands::markdown_response::format_help_markdown;
pub use crate::commands::ready::ReadyNotice;

/// A chat message handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Raw message body
    pub body: String,
    /// Platform identifier of the channel, replies go there
    pub channel_id: String,
    /// Human readable channel name, compared with the restricted channel
    pub channel_name: String,
    /// Sender identifier, only used for logging
    pub sender: String,
    /// Snapshot of the sender's role names
    pub roles: RoleSet,
}

/// One field of the help document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpField {
    pub name: String,
    pub value: String,
}

/// Structured help document, rendered by the chat adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpDocument {
    pub title: String,
    pub description: String,
    pub fields: Vec<HelpField>,
}

/// Outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Markdown text
    Text(String),
    /// Structured document
    Help(HelpDocument),
}

#[cfg(test)]
impl Reply {
    /// Returns the text of a [`Reply::Text`], `None` for documents.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Help(_) => None,
        }
    }
}

/// What the caller must do once a message is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Message filtered out, nothing was sent
    Ignored,
    /// A reply was sent
    Replied,
    /// The acknowledgement was sent, the process must exit with success
    Exit,
}

/// Chat platform operations consumed by the dispatcher.
///
/// This trait abstracts the chat platform for easier testing with mocks.
#[automock]
pub trait ChatSession {
    /// Sends `reply` to the channel identified by `channel_id`.
    async fn send_reply(&self, channel_id: &str, reply: &Reply);
    /// Lists the names of every channel known to the bot.
    async fn channel_names(&self) -> Vec<String>;
}

/// Runtime context for command execution.
///
/// Groups what every action handler needs to answer in the originating channel.
pub struct CommandContext<'a, C: ChatSession> {
    /// Chat platform, used for progress notices and channel lookups
    pub chat: &'a C,
    /// Channel the command came from
    pub channel_id: &'a str,
    /// Shared configuration store, single writer
    pub config_store: &'a Mutex<ConfigStore>,
}
