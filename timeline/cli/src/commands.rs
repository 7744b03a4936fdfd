//! Input line parsing
//!
//! Anything that does not start with `/` is a message for the assistant.

use thiserror::Error;

/// One line typed by the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Send the text as a user message
    Send(String),
    /// Print every step of a turn (1-based; `None` means the latest)
    Expand(Option<usize>),
    /// List turns
    Turns,
    /// Dial the endpoint again
    Reconnect,
    /// Close the connection and exit
    Quit,
    /// Show the command summary
    Help,
    /// Blank line
    Empty,
}

/// Why an input line was rejected
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    /// `/something` that is not a known command
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),
    /// `/expand` with an argument that is not a positive number
    #[error("'{0}' is not a turn number")]
    BadTurnNumber(String),
}

/// Summary printed by `/help`
pub const HELP: &str = "\
commands:
  /expand [n]   show every step of turn n (default: latest)
  /turns        list turns
  /reconnect    dial the endpoint again
  /quit         close the connection and exit
anything else is sent to the assistant";

/// Parse one input line
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Command::Empty);
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Command::Send(trimmed.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();

    match name.as_str() {
        "expand" | "e" => match arg {
            None => Ok(Command::Expand(None)),
            Some(n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Command::Expand(Some(n))),
                _ => Err(CommandError::BadTurnNumber(n.to_string())),
            },
        },
        "turns" | "t" => Ok(Command::Turns),
        "reconnect" => Ok(Command::Reconnect),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        "help" | "h" | "?" => Ok(Command::Help),
        _ => Err(CommandError::Unknown(name)),
    }
}
