//! Query command handler.
//!
//! `mc!query` uses the full query protocol, any token containing `status`
//! uses the server list ping instead. Both accept an optional
//! `host[:port]` overriding the configured server.

use log::{info, warn};

use crate::{
    commands::{
        ChatSession, CommandContext, Reply,
        command::CommandLine,
        markdown_response::{
            format_incorrect_arguments, format_invalid_address, format_no_server_configured,
            format_query_disabled, format_query_result, format_querying, format_server_offline,
        },
    },
    status::{QueryMode, ServerAddress, StatusRequester},
};

/// Picks the query mechanism from the command token.
fn query_mode(name: &str) -> QueryMode {
    if name.starts_with("status") {
        QueryMode::Status
    } else {
        QueryMode::Full
    }
}

/// Resolves the target server from the arguments or the configuration.
///
/// Returns the error reply when the target cannot be determined.
async fn target_address<C: ChatSession>(
    context: &CommandContext<'_, C>,
    rest: &str,
) -> Result<ServerAddress, Reply> {
    let arguments: Vec<&str> = rest.split_whitespace().collect();

    match arguments.as_slice() {
        [] => context
            .config_store
            .lock()
            .await
            .get_server_address()
            .ok_or_else(|| Reply::Text(format_no_server_configured())),
        [argument] => argument
            .parse::<ServerAddress>()
            .map_err(|e| Reply::Text(format_invalid_address(argument, &e))),
        _ => Err(Reply::Text(format_incorrect_arguments())),
    }
}

/// Handles `query` and `status`.
///
/// A progress notice is sent before the server is contacted, the returned reply
/// carries the result or the mode specific failure message.
pub async fn handle_query<C: ChatSession, R: StatusRequester>(
    context: &CommandContext<'_, C>,
    requester: &R,
    command_line: &CommandLine<'_>,
) -> Reply {
    let mode = query_mode(command_line.name);

    let address = match target_address(context, command_line.rest).await {
        Ok(address) => address,
        Err(reply) => return reply,
    };

    info!("querying {} with {:?}", address, mode);
    context
        .chat
        .send_reply(context.channel_id, &Reply::Text(format_querying()))
        .await;

    match requester.query(&address, mode).await {
        Ok(result) => Reply::Text(format_query_result(&address, &result)),
        Err(e) => {
            warn!("query of {} failed: {}", address, e);
            match mode {
                QueryMode::Full => Reply::Text(format_query_disabled()),
                QueryMode::Status => Reply::Text(format_server_offline()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        commands::{
            actions::test_utils::{config_store, recording_chat, sent_texts},
            command::tokenize,
        },
        status::{MockStatusRequester, QueryError, QueryResult},
    };

    fn online(names: &[&str], current: u32, max: u32) -> QueryResult {
        QueryResult {
            online: true,
            current_players: current,
            max_players: max,
            sample_names: names.iter().map(|name| name.to_string()).collect(),
            version: None,
        }
    }

    #[test]
    fn test_query_mode() {
        assert_eq!(query_mode("query"), QueryMode::Full);
        assert_eq!(query_mode("status"), QueryMode::Status);
        assert_eq!(query_mode("statusx"), QueryMode::Status);
        // Contains "query" and "status" but starts with neither
        assert_eq!(query_mode("xstatus"), QueryMode::Full);
    }

    #[tokio::test]
    async fn test_handle_query_default_target() {
        let dir = TempDir::new().unwrap();
        let store = config_store(&dir, Some("play.example.com")).await;
        let (chat, sent) = recording_chat(&[]);

        let mut requester = MockStatusRequester::new();
        requester
            .expect_query()
            .with(
                eq(ServerAddress::new("play.example.com", 25565)),
                eq(QueryMode::Full),
            )
            .times(1)
            .returning(|_, _| Ok(online(&["Alice", "Bob"], 2, 20)));

        let context = CommandContext {
            chat: &chat,
            channel_id: "!room:example.com",
            config_store: &store,
        };
        let line = tokenize("mc!query").unwrap();
        let reply = handle_query(&context, &requester, &line).await;

        let text = reply.as_text().unwrap();
        assert!(text.contains("(2/20 players)"));
        assert!(text.contains("`Alice, Bob`"));
        assert_eq!(sent_texts(&sent), vec![format_querying()]);
        assert_eq!(sent.lock().unwrap()[0].0, "!room:example.com");
    }

    #[tokio::test]
    async fn test_handle_status_explicit_target() {
        let dir = TempDir::new().unwrap();
        let store = config_store(&dir, None).await;
        let (chat, _sent) = recording_chat(&[]);

        let mut requester = MockStatusRequester::new();
        requester
            .expect_query()
            .with(eq(ServerAddress::new("mc.local", 25570)), eq(QueryMode::Status))
            .times(1)
            .returning(|_, _| Ok(online(&[], 0, 10)));

        let context = CommandContext {
            chat: &chat,
            channel_id: "!room:example.com",
            config_store: &store,
        };
        let line = tokenize("mc!status mc.local:25570").unwrap();
        let reply = handle_query(&context, &requester, &line).await;

        assert!(reply.as_text().unwrap().contains("No one is online."));
    }

    #[tokio::test]
    async fn test_handle_query_no_server_configured() {
        let dir = TempDir::new().unwrap();
        let store = config_store(&dir, None).await;
        let (chat, sent) = recording_chat(&[]);

        let mut requester = MockStatusRequester::new();
        requester.expect_query().never();

        let context = CommandContext {
            chat: &chat,
            channel_id: "!room:example.com",
            config_store: &store,
        };
        let line = tokenize("mc!query").unwrap();
        let reply = handle_query(&context, &requester, &line).await;

        assert_eq!(reply, Reply::Text(format_no_server_configured()));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_query_failures_per_mode() {
        let dir = TempDir::new().unwrap();
        let store = config_store(&dir, Some("play.example.com")).await;
        let (chat, _sent) = recording_chat(&[]);

        let mut requester = MockStatusRequester::new();
        requester
            .expect_query()
            .with(always(), always())
            .times(2)
            .returning(|_, _| Err(QueryError::Timeout));

        let context = CommandContext {
            chat: &chat,
            channel_id: "!room:example.com",
            config_store: &store,
        };

        let query = tokenize("mc!query").unwrap();
        assert_eq!(
            handle_query(&context, &requester, &query).await,
            Reply::Text(format_query_disabled())
        );

        let status = tokenize("mc!status").unwrap();
        assert_eq!(
            handle_query(&context, &requester, &status).await,
            Reply::Text(format_server_offline())
        );
    }

    #[tokio::test]
    async fn test_handle_query_invalid_address() {
        let dir = TempDir::new().unwrap();
        let store = config_store(&dir, Some("play.example.com")).await;
        let (chat, sent) = recording_chat(&[]);

        let mut requester = MockStatusRequester::new();
        requester.expect_query().never();

        let context = CommandContext {
            chat: &chat,
            channel_id: "!room:example.com",
            config_store: &store,
        };
        let line = tokenize("mc!query host:notaport").unwrap();
        let reply = handle_query(&context, &requester, &line).await;

        assert!(reply.as_text().unwrap().starts_with("❌ Invalid server address `host:notaport`"));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_query_too_many_arguments() {
        let dir = TempDir::new().unwrap();
        let store = config_store(&dir, Some("play.example.com")).await;
        let (chat, _sent) = recording_chat(&[]);

        let mut requester = MockStatusRequester::new();
        requester.expect_query().never();

        let context = CommandContext {
            chat: &chat,
            channel_id: "!room:example.com",
            config_store: &store,
        };
        let line = tokenize("mc!query a.example b.example").unwrap();
        let reply = handle_query(&context, &requester, &line).await;

        assert_eq!(reply, Reply::Text(format_incorrect_arguments()));
    }
}
