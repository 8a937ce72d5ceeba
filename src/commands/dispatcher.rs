//! Command orchestration and execution.
//!
//! This module provides the [`Dispatcher`] struct, which serves as the main
//! entry point for processing bot commands. It filters inbound messages,
//! resolves the command and routes it to its handler.
//!
//! # Flow
//!
//! ```text
//! InboundMessage → tokenize() → channel filter → resolve() → handler → send_reply()
//! ```
//!
//! # Examples
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use tokio::sync::Mutex;
//! # use mcqbot::commands::{ChatSession, Dispatcher, InboundMessage, Outcome};
//! # use mcqbot::config::ConfigStore;
//! # use mcqbot::launcher::StartScript;
//! # use mcqbot::status::MinecraftStatusClient;
//! # async fn example(chat: impl ChatSession, store: ConfigStore, message: InboundMessage) {
//! let dispatcher = Dispatcher::new(
//!     MinecraftStatusClient::new(),
//!     Arc::new(Mutex::new(store)),
//!     StartScript::new("start.sh"),
//! );
//!
//! if dispatcher.dispatch(&message, &chat).await == Outcome::Exit {
//!     std::process::exit(0);
//! }
//! # }
//! ```

use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;

use crate::{
    commands::{
        ChatSession, CommandContext, InboundMessage, Outcome, Reply,
        actions::{
            handle_exit, handle_help, handle_query, handle_set_channel, handle_start_server,
        },
        command::{Command, resolve, tokenize},
        markdown_response::format_unknown_command,
    },
    config::ConfigStore,
    launcher::StartScript,
    status::StatusRequester,
};

/// Command orchestrator.
///
/// The Dispatcher is responsible for:
/// - Ignoring messages without the `mc!` prefix
/// - Ignoring messages outside the restricted channel, when one is set
/// - Routing commands to their handlers, privileged ones only for managers
/// - Sending exactly one final reply per handled message
///
/// It holds no per-message state, concurrent dispatches only share the
/// configuration store behind its mutex.
pub struct Dispatcher<R: StatusRequester> {
    /// Server status client
    status_requester: R,
    /// Shared configuration store
    config_store: Arc<Mutex<ConfigStore>>,
    /// Script launched by `start-server`
    start_script: StartScript,
}

impl<R: StatusRequester> Dispatcher<R> {
    /// Creates a new [`Dispatcher`].
    ///
    /// # Arguments
    ///
    /// * `status_requester` - Client used by `query`, `status` and `start-server`
    /// * `config_store` - Store shared with the chat adapter
    /// * `start_script` - Script launched when the server is offline
    pub fn new(
        status_requester: R,
        config_store: Arc<Mutex<ConfigStore>>,
        start_script: StartScript,
    ) -> Self {
        Dispatcher {
            status_requester,
            config_store,
            start_script,
        }
    }

    /// Handles one inbound message.
    ///
    /// # Returns
    ///
    /// * [`Outcome::Ignored`] - Not a command, or outside the restricted channel
    /// * [`Outcome::Replied`] - The reply was sent
    /// * [`Outcome::Exit`] - The exit acknowledgement was sent, the caller must
    ///   terminate the process
    pub async fn dispatch<C: ChatSession>(&self, message: &InboundMessage, chat: &C) -> Outcome {
        let Some(command_line) = tokenize(&message.body) else {
            return Outcome::Ignored;
        };

        {
            let store = self.config_store.lock().await;
            let restricted = store.get_restricted_channel();
            if !restricted.is_empty() && restricted != message.channel_name {
                debug!(
                    "ignoring command from '{}', restricted to '{}'",
                    message.channel_name, restricted
                );
                return Outcome::Ignored;
            }
        }

        info!(
            "message from {} in '{}': {}",
            message.sender, message.channel_name, message.body
        );

        let context = CommandContext {
            chat,
            channel_id: &message.channel_id,
            config_store: &self.config_store,
        };

        let command = resolve(command_line.name, &message.roles);
        let reply = match command {
            Some(Command::Exit) => handle_exit(),
            Some(Command::Query) => {
                handle_query(&context, &self.status_requester, &command_line).await
            }
            Some(Command::StartServer) => {
                handle_start_server(&context, &self.status_requester, &self.start_script).await
            }
            Some(Command::Help) => handle_help(),
            Some(Command::SetChannel) => handle_set_channel(&context, &command_line).await,
            None => Reply::Text(format_unknown_command()),
        };

        chat.send_reply(&message.channel_id, &reply).await;

        if command == Some(Command::Exit) {
            Outcome::Exit
        } else {
            Outcome::Replied
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        commands::{
            MockChatSession, RoleSet,
            actions::test_utils::{config_store, recording_chat, sent_texts},
            authorization::MANAGER_ROLE,
            markdown_response::{
                format_channel_set, format_exit, format_querying, format_start_script_missing,
            },
        },
        status::{MockStatusRequester, QueryMode, QueryResult, ServerAddress},
    };

    fn message(body: &str, channel_name: &str, roles: &[&str]) -> InboundMessage {
        InboundMessage {
            body: body.to_owned(),
            channel_id: format!("!{}:example.com", channel_name),
            channel_name: channel_name.to_owned(),
            sender: "@steve:example.com".to_owned(),
            roles: roles.iter().copied().collect::<RoleSet>(),
        }
    }

    async fn dispatcher(
        dir: &TempDir,
        server: Option<&str>,
        requester: MockStatusRequester,
    ) -> Dispatcher<MockStatusRequester> {
        let store = config_store(dir, server).await;
        Dispatcher::new(
            requester,
            Arc::new(store),
            StartScript::new(dir.path().join("start.sh")),
        )
    }

    fn silent_chat() -> MockChatSession {
        let mut chat = MockChatSession::new();
        chat.expect_send_reply().never();
        chat.expect_channel_names().never();
        chat
    }

    #[tokio::test]
    async fn test_dispatch_ignores_messages_without_prefix() {
        let dir = TempDir::new().unwrap();
        let mut requester = MockStatusRequester::new();
        requester.expect_query().never();
        let dispatcher = dispatcher(&dir, Some("play.example.com"), requester).await;

        for body in ["hello", "query", "!mc query", " mc!query", "MC!query"] {
            let outcome = dispatcher
                .dispatch(&message(body, "general", &[]), &silent_chat())
                .await;
            assert_eq!(outcome, Outcome::Ignored, "{body}");
        }
    }

    #[tokio::test]
    async fn test_dispatch_ignores_other_channels_when_restricted() {
        let dir = TempDir::new().unwrap();
        let mut requester = MockStatusRequester::new();
        requester.expect_query().never();
        let dispatcher = dispatcher(&dir, Some("play.example.com"), requester).await;
        dispatcher
            .config_store
            .lock()
            .await
            .set_restricted_channel("minecraft")
            .await
            .unwrap();

        let outcome = dispatcher
            .dispatch(&message("mc!help", "general", &[MANAGER_ROLE]), &silent_chat())
            .await;
        assert_eq!(outcome, Outcome::Ignored);

        let (chat, sent) = recording_chat(&[]);
        let outcome = dispatcher
            .dispatch(&message("mc!help", "minecraft", &[]), &chat)
            .await;
        assert_eq!(outcome, Outcome::Replied);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_query_configured_server() {
        let dir = TempDir::new().unwrap();
        let mut requester = MockStatusRequester::new();
        requester
            .expect_query()
            .with(
                eq(ServerAddress::new("play.example.com", 25565)),
                eq(QueryMode::Full),
            )
            .times(1)
            .returning(|_, _| {
                Ok(QueryResult {
                    online: true,
                    current_players: 2,
                    max_players: 20,
                    sample_names: vec!["Alice".to_owned(), "Bob".to_owned()],
                    version: None,
                })
            });
        let dispatcher = dispatcher(&dir, Some("play.example.com"), requester).await;

        let (chat, sent) = recording_chat(&[]);
        let outcome = dispatcher
            .dispatch(&message("mc!query", "general", &[]), &chat)
            .await;

        assert_eq!(outcome, Outcome::Replied);
        let texts = sent_texts(&sent);
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], format_querying());
        for expected in ["play.example.com:25565", "2", "20", "Alice, Bob"] {
            assert!(texts[1].contains(expected), "{expected} missing");
        }
        // Replies go to the originating channel
        assert!(
            sent.lock()
                .unwrap()
                .iter()
                .all(|(channel_id, _)| channel_id == "!general:example.com")
        );
    }

    #[tokio::test]
    async fn test_dispatch_status_explicit_address_ignores_config() {
        let dir = TempDir::new().unwrap();
        let mut requester = MockStatusRequester::new();
        requester
            .expect_query()
            .with(
                eq(ServerAddress::new("other.example.com", 25566)),
                eq(QueryMode::Status),
            )
            .times(1)
            .returning(|_, _| {
                Ok(QueryResult {
                    online: true,
                    max_players: 20,
                    ..Default::default()
                })
            });
        // No configured server at all
        let dispatcher = dispatcher(&dir, None, requester).await;

        let (chat, sent) = recording_chat(&[]);
        dispatcher
            .dispatch(
                &message("mc!status other.example.com:25566", "general", &[]),
                &chat,
            )
            .await;

        let texts = sent_texts(&sent);
        assert!(texts[1].contains("other.example.com:25566"));
        assert!(texts[1].contains("No one is online."));
    }

    #[tokio::test]
    async fn test_dispatch_set_channel_requires_manager() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, None, MockStatusRequester::new()).await;

        let (chat, sent) = recording_chat(&["general"]);
        let outcome = dispatcher
            .dispatch(&message("mc!set-channel general", "general", &["Member"]), &chat)
            .await;

        assert_eq!(outcome, Outcome::Replied);
        assert_eq!(sent_texts(&sent), vec![format_unknown_command()]);
        assert_eq!(
            dispatcher.config_store.lock().await.get_restricted_channel(),
            ""
        );
    }

    #[tokio::test]
    async fn test_dispatch_set_channel_as_manager() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, None, MockStatusRequester::new()).await;

        let (chat, sent) = recording_chat(&["general", "minecraft"]);
        dispatcher
            .dispatch(
                &message("mc!set-channel minecraft", "general", &[MANAGER_ROLE]),
                &chat,
            )
            .await;

        assert_eq!(sent_texts(&sent), vec![format_channel_set("minecraft")]);
        assert_eq!(
            dispatcher.config_store.lock().await.get_restricted_channel(),
            "minecraft"
        );
    }

    #[tokio::test]
    async fn test_dispatch_start_without_script() {
        let dir = TempDir::new().unwrap();
        let mut requester = MockStatusRequester::new();
        requester.expect_query().never();
        let dispatcher = dispatcher(&dir, Some("play.example.com"), requester).await;

        let (chat, sent) = recording_chat(&[]);
        let outcome = dispatcher
            .dispatch(&message("mc!start", "general", &[]), &chat)
            .await;

        assert_eq!(outcome, Outcome::Replied);
        assert_eq!(sent_texts(&sent), vec![format_start_script_missing()]);
    }

    #[tokio::test]
    async fn test_dispatch_help_sends_document() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, None, MockStatusRequester::new()).await;

        let (chat, sent) = recording_chat(&[]);
        dispatcher
            .dispatch(&message("mc!help", "general", &[]), &chat)
            .await;

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].1, Reply::Help(_)));
    }

    #[tokio::test]
    async fn test_dispatch_exit_as_manager() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, None, MockStatusRequester::new()).await;

        let (chat, sent) = recording_chat(&[]);
        let outcome = dispatcher
            .dispatch(&message("mc!exit", "general", &[MANAGER_ROLE]), &chat)
            .await;

        assert_eq!(outcome, Outcome::Exit);
        assert_eq!(sent_texts(&sent), vec![format_exit()]);
    }

    #[tokio::test]
    async fn test_dispatch_exit_as_member() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, None, MockStatusRequester::new()).await;

        let (chat, sent) = recording_chat(&[]);
        let outcome = dispatcher
            .dispatch(&message("mc!exit", "general", &["Moderator"]), &chat)
            .await;

        assert_eq!(outcome, Outcome::Replied);
        assert_eq!(sent_texts(&sent), vec![format_unknown_command()]);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_command() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir, None, MockStatusRequester::new()).await;

        for body in ["mc!", "mc!dance", "mc!exits", "mc!helpme"] {
            let (chat, sent) = recording_chat(&[]);
            dispatcher
                .dispatch(&message(body, "general", &[MANAGER_ROLE]), &chat)
                .await;
            assert_eq!(sent_texts(&sent), vec![format_unknown_command()], "{body}");
        }
    }
}
