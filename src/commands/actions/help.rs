//! Help command handler.
//!
//! Displays every command, its arguments and whether it requires the
//! `Bot Manager` role. This is a stateless command that always returns the
//! same document.

use log::debug;

use crate::commands::{Reply, markdown_response::format_help};

/// Returns the structured help document.
pub fn handle_help() -> Reply {
    debug!("handling help command");

    Reply::Help(format_help())
}
