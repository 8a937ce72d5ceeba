//! Exit command handler.
//!
//! Only returns the acknowledgement, the dispatcher sends it and reports
//! [`Outcome::Exit`](crate::commands::Outcome::Exit) so the caller terminates
//! the process once the message is out.

use log::info;

use crate::commands::{Reply, markdown_response::format_exit};

pub fn handle_exit() -> Reply {
    info!("handling exit command");

    Reply::Text(format_exit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_exit() {
        assert_eq!(handle_exit(), Reply::Text("⏹️ Exiting...".to_owned()));
    }
}
