//! Set channel command handler.
//!
//! Restricts the bot to a single channel, or lifts the restriction with `~`.
//! The change is persisted before the confirmation is returned.

use log::{info, warn};

use crate::commands::{
    ChatSession, CommandContext, Reply,
    command::CommandLine,
    markdown_response::{
        format_accept_all_channels, format_channel_set, format_config_not_saved,
        format_incorrect_arguments, format_invalid_channel,
    },
};

/// Argument lifting the restriction.
const ALL_CHANNELS: &str = "~";

/// Handles `set-channel <channel>` and `set-channel ~`.
///
/// The whole command line split on single spaces must have exactly two parts,
/// so `mc!set-channel  general` (two spaces) is rejected.
pub async fn handle_set_channel<C: ChatSession>(
    context: &CommandContext<'_, C>,
    command_line: &CommandLine<'_>,
) -> Reply {
    let parts: Vec<&str> = command_line.line.split(' ').collect();
    let [_, argument] = parts.as_slice() else {
        return Reply::Text(format_incorrect_arguments());
    };

    let (channel, confirmation) = if *argument == ALL_CHANNELS {
        ("", format_accept_all_channels())
    } else {
        let known = context.chat.channel_names().await;
        if !known.iter().any(|name| name.as_str() == *argument) {
            info!("refusing unknown channel '{}'", argument);
            return Reply::Text(format_invalid_channel());
        }
        (*argument, format_channel_set(argument))
    };

    match context
        .config_store
        .lock()
        .await
        .set_restricted_channel(channel)
        .await
    {
        Ok(()) => Reply::Text(confirmation),
        Err(e) => {
            warn!("failed to persist restricted channel: {}", e);
            Reply::Text(format_config_not_saved())
        }
    }
}
