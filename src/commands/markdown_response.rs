//! Markdown response formatters for bot commands.
//!
//! This module provides every user-facing text of the bot, formatted in
//! Markdown for display in Matrix rooms.

use crate::{
    commands::{HelpDocument, HelpField},
    launcher::LaunchError,
    status::{AddressError, QueryResult, ServerAddress},
};

/// Sent before any blocking server query.
pub fn format_querying() -> String {
    "🔄 Querying server, this may take a while...".to_owned()
}

/// Formats the answer of a successful query.
///
/// Lists the sample names comma-joined, or states that no one is online when
/// the sample is empty, whatever the player count says.
pub fn format_query_result(address: &ServerAddress, result: &QueryResult) -> String {
    if !result.online {
        return format_server_offline();
    }

    let players = if result.sample_names.is_empty() {
        "No one is online.".to_owned()
    } else {
        format!("Players: `{}`", result.sample_names.join(", "))
    };

    let version = match &result.version {
        Some(version) => format!(" Version: `{}`.", version),
        None => String::new(),
    };

    format!(
        "✅ Server with address `{}` is online ({}/{} players). {}{}",
        address, result.current_players, result.max_players, players, version
    )
}

/// Full query failed, usually because `enable-query` is off.
pub fn format_query_disabled() -> String {
    "❌ Error querying server. The server may be offline or have query disabled. \
    Make sure `enable-query` is set to `true` in your `server.properties` file, \
    or use `mc!status` instead."
        .to_owned()
}

/// Status ping failed.
pub fn format_server_offline() -> String {
    "❌ Error querying server. The server may be offline.".to_owned()
}

pub fn format_no_server_configured() -> String {
    "❌ No server configured. Set `server` in the configuration file or pass `<host>[:port]`."
        .to_owned()
}

pub fn format_invalid_address(argument: &str, error: &AddressError) -> String {
    format!("❌ Invalid server address `{}`: {}.", argument, error)
}

pub fn format_incorrect_arguments() -> String {
    "❌ Incorrect number of arguments.".to_owned()
}

pub fn format_start_script_missing() -> String {
    "❌ No `start.sh` file found. Please add the file and mark it as executable.".to_owned()
}

pub fn format_server_running() -> String {
    "❌ The server is currently online.".to_owned()
}

pub fn format_start_script_launched() -> String {
    "✅ Executing script...".to_owned()
}

pub fn format_start_script_failed(error: &LaunchError) -> String {
    format!("❌ Failed to execute start script: {}.", error)
}

pub fn format_accept_all_channels() -> String {
    "✅ Set to accept all channels.".to_owned()
}

pub fn format_channel_set(channel: &str) -> String {
    format!("✅ Channel set to \"#{}\".", channel)
}

pub fn format_invalid_channel() -> String {
    "❌ Invalid channel.".to_owned()
}

pub fn format_config_not_saved() -> String {
    "❌ Could not save the configuration.".to_owned()
}

pub fn format_exit() -> String {
    "⏹️ Exiting...".to_owned()
}

pub fn format_unknown_command() -> String {
    "❓ Command not recognized.".to_owned()
}

/// Sent once per connection to the restricted channel.
pub fn format_init_success() -> String {
    "✅ Initialization successful.".to_owned()
}

/// Builds the help document listing every command.
///
/// Commands marked with `*` require the `Bot Manager` role.
pub fn format_help() -> HelpDocument {
    let field = |name: &str, value: &str| HelpField {
        name: name.to_owned(),
        value: value.to_owned(),
    };

    HelpDocument {
        title: "Help".to_owned(),
        description: "All commands start with `mc!`. Commands marked with \"*\" require the \
            \"Bot Manager\" role. If you do not have that role and try to use one of the *'d \
            commands, the bot will not recognize it."
            .to_owned(),
        fields: vec![
            field(
                "query [host[:port]]",
                "Queries the server with the full query protocol, listing every online player. \
                Defaults to the configured server.",
            ),
            field(
                "status [host[:port]]",
                "Pings the server, works without `enable-query` but may only list a sample of players.",
            ),
            field("start-server", "Starts the server if it crashed. Alias: `start`."),
            field(
                "set-channel <channel>",
                "* Sets the sole response channel. Pass '~' to respond in all channels. A room \
                is referenced by its alias, e.g. `minecraft` for `#minecraft:example.org`; a room \
                without alias by its name, which must not contain spaces.",
            ),
            field("exit", "* Exits the bot."),
            field("help", "Prints this help document."),
        ],
    }
}

/// Renders a help document as Markdown.
pub fn format_help_markdown(document: &HelpDocument) -> String {
    let fields = document
        .fields
        .iter()
        .map(|field| format!("- `{}`: {}", field.name, field.value))
        .collect::<Vec<String>>()
        .join("\n");

    format!(
        "**{}**\n\n{}\n\n{}",
        document.title, document.description, fields
    )
}
