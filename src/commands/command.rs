//! Command tokenizing and matching.
//!
//! Commands match either by exact equality or by substring containment of the
//! command token. The rules live in a single ordered table, the first row whose
//! rule matches *and* whose authorization is satisfied wins. A privileged row
//! failing authorization is skipped, so an unauthorized `set-channel` ends as
//! an unknown command.

use log::debug;

use crate::commands::authorization::{MANAGER_ROLE, RoleSet, is_authorized};

/// Prefix of every bot command.
pub const COMMAND_PREFIX: &str = "mc!";

/// A message split in command token and arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLine<'a> {
    /// Everything after the prefix
    pub line: &'a str,
    /// Text before the first space
    pub name: &'a str,
    /// Text after the first space, may be empty
    pub rest: &'a str,
}

/// Strips the prefix and splits on the first space.
///
/// Returns `None` when `body` does not start with [`COMMAND_PREFIX`].
pub fn tokenize(body: &str) -> Option<CommandLine<'_>> {
    let line = body.strip_prefix(COMMAND_PREFIX)?;
    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    Some(CommandLine { line, name, rest })
}

/// Bot commands.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Command {
    /// Acknowledge and stop the process
    Exit,
    /// Query the server, `status*` tokens use the lightweight ping
    Query,
    /// Run the start script when the server is offline
    StartServer,
    /// Display the help document
    Help,
    /// Restrict the response channel
    SetChannel,
}

#[derive(Debug)]
enum MatchRule {
    /// Token equals one of the names
    Exact(&'static [&'static str]),
    /// Token contains one of the names
    Contains(&'static [&'static str]),
}

impl MatchRule {
    fn matches(&self, token: &str) -> bool {
        match self {
            MatchRule::Exact(names) => names.contains(&token),
            MatchRule::Contains(names) => names.iter().any(|name| token.contains(name)),
        }
    }
}

#[derive(Debug)]
struct CommandRule {
    command: Command,
    rule: MatchRule,
    /// Role the caller must hold, `None` for everyone
    required_role: Option<&'static str>,
}

/// Evaluated top to bottom.
const COMMAND_TABLE: [CommandRule; 5] = [
    CommandRule {
        command: Command::Exit,
        rule: MatchRule::Exact(&["exit"]),
        required_role: Some(MANAGER_ROLE),
    },
    CommandRule {
        command: Command::Query,
        rule: MatchRule::Contains(&["query", "status"]),
        required_role: None,
    },
    CommandRule {
        command: Command::StartServer,
        rule: MatchRule::Exact(&["start-server", "start"]),
        required_role: None,
    },
    CommandRule {
        command: Command::Help,
        rule: MatchRule::Exact(&["help"]),
        required_role: None,
    },
    CommandRule {
        command: Command::SetChannel,
        rule: MatchRule::Contains(&["set-channel"]),
        required_role: Some(MANAGER_ROLE),
    },
];

/// Resolves a command token against the matching table.
///
/// Returns `None` for unknown tokens and for privileged commands the caller is
/// not allowed to run.
pub fn resolve(token: &str, roles: &RoleSet) -> Option<Command> {
    let command = COMMAND_TABLE
        .iter()
        .find(|row| {
            row.rule.matches(token)
                && row
                    .required_role
                    .is_none_or(|required| is_authorized(roles, required))
        })
        .map(|row| row.command);

    debug!("resolved token '{}' to {:?}", token, command);
    command
}
