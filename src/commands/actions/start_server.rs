//! Start server command handler.
//!
//! Runs the start script when the configured server does not answer a status
//! ping. A server that answers is never started twice.

use log::{info, warn};

use crate::{
    commands::{
        ChatSession, CommandContext, Reply,
        markdown_response::{
            format_no_server_configured, format_querying, format_server_running,
            format_start_script_failed, format_start_script_launched, format_start_script_missing,
        },
    },
    launcher::StartScript,
    status::{QueryMode, StatusRequester},
};

/// Handles `start-server` and `start`.
///
/// # Flow
///
/// 1. The start script must be a runnable file, the server is not contacted otherwise
/// 2. The configured server is pinged, after a progress notice
/// 3. A timeout or an offline answer launches the script detached
pub async fn handle_start_server<C: ChatSession, R: StatusRequester>(
    context: &CommandContext<'_, C>,
    requester: &R,
    start_script: &StartScript,
) -> Reply {
    if !start_script.is_runnable().await {
        warn!("start script {} is missing", start_script.path().display());
        return Reply::Text(format_start_script_missing());
    }

    let Some(address) = context.config_store.lock().await.get_server_address() else {
        return Reply::Text(format_no_server_configured());
    };

    context
        .chat
        .send_reply(context.channel_id, &Reply::Text(format_querying()))
        .await;

    match requester.query(&address, QueryMode::Status).await {
        Ok(result) if result.online => {
            info!("{} is online, start script not launched", address);
            return Reply::Text(format_server_running());
        }
        Ok(_) => info!("{} reported offline", address),
        Err(e) => info!("{} did not answer: {}", address, e),
    }

    match start_script.launch().await {
        Ok(()) => Reply::Text(format_start_script_launched()),
        Err(e) => {
            warn!("failed to launch start script: {}", e);
            Reply::Text(format_start_script_failed(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        commands::actions::test_utils::{config_store, recording_chat, sent_texts},
        status::{MockStatusRequester, QueryError, QueryResult},
    };

    #[cfg(unix)]
    async fn runnable_script(dir: &TempDir, marker: &std::path::Path) -> StartScript {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("start.sh");
        let body = format!("#!/bin/sh\ntouch '{}'\n", marker.display());
        tokio::fs::write(&path, body).await.unwrap();
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .await
            .unwrap();
        StartScript::new(path)
    }

    #[tokio::test]
    async fn test_start_server_script_missing() {
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
        let script = StartScript::new(dir.path().join("start.sh"));
        let reply = handle_start_server(&context, &requester, &script).await;

        assert_eq!(reply, Reply::Text(format_start_script_missing()));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_server_already_running() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("started");
        let script = runnable_script(&dir, &marker).await;
        let store = config_store(&dir, Some("play.example.com")).await;
        let (chat, sent) = recording_chat(&[]);

        let mut requester = MockStatusRequester::new();
        requester
            .expect_query()
            .with(always(), eq(QueryMode::Status))
            .times(1)
            .returning(|_, _| {
                Ok(QueryResult {
                    online: true,
                    ..Default::default()
                })
            });

        let context = CommandContext {
            chat: &chat,
            channel_id: "!room:example.com",
            config_store: &store,
        };
        let reply = handle_start_server(&context, &requester, &script).await;

        assert_eq!(reply, Reply::Text(format_server_running()));
        assert_eq!(sent_texts(&sent), vec![format_querying()]);
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_server_launches_when_offline() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("started");
        let script = runnable_script(&dir, &marker).await;
        let store = config_store(&dir, Some("play.example.com")).await;
        let (chat, _sent) = recording_chat(&[]);

        let mut requester = MockStatusRequester::new();
        requester
            .expect_query()
            .times(1)
            .returning(|_, _| Err(QueryError::Timeout));

        let context = CommandContext {
            chat: &chat,
            channel_id: "!room:example.com",
            config_store: &store,
        };
        let reply = handle_start_server(&context, &requester, &script).await;
        assert_eq!(reply, Reply::Text(format_start_script_launched()));

        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_server_no_server_configured() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("started");
        let script = runnable_script(&dir, &marker).await;
        let store = config_store(&dir, None).await;
        let (chat, _sent) = recording_chat(&[]);

        let mut requester = MockStatusRequester::new();
        requester.expect_query().never();

        let context = CommandContext {
            chat: &chat,
            channel_id: "!room:example.com",
            config_store: &store,
        };
        let reply = handle_start_server(&context, &requester, &script).await;

        assert_eq!(reply, Reply::Text(format_no_server_configured()));
    }
}
