//! Parsing of input lines.

use crate::usecase::Intent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(String),
    Name(String),
    Call,
    Hangup,
    Leave,
    Status,
    Help,
    Quit,
    /// Plain text to send as a chat message
    Say(String),
    /// A `/`-prefixed word we do not know, or a command missing its argument
    Unknown(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Say(line.to_string());
        };
        let (word, arg) = match rest.split_once(char::is_whitespace) {
            Some((word, arg)) => (word, arg.trim()),
            None => (rest, ""),
        };
        match (word, arg) {
            ("join", arg) if !arg.is_empty() => Command::Join(arg.to_string()),
            ("name", arg) if !arg.is_empty() => Command::Name(arg.to_string()),
            ("call", _) => Command::Call,
            ("hangup", _) => Command::Hangup,
            ("leave", _) => Command::Leave,
            ("status", _) => Command::Status,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }

    /// The session intent for this command, if it maps to one.
    pub fn into_intent(self) -> Option<Intent> {
        match self {
            Command::Join(room) => Some(Intent::JoinRoom(room)),
            Command::Name(name) => Some(Intent::SetName(name)),
            Command::Call => Some(Intent::StartCall),
            Command::Hangup => Some(Intent::EndCall),
            Command::Leave => Some(Intent::Leave),
            Command::Say(text) => Some(Intent::SendMessage(text)),
            Command::Status
            | Command::Help
            | Command::Quit
            | Command::Unknown(_)
            | Command::Empty => None,
        }
    }
}

pub const HELP: &str = "\
Commands:
  /join <room>   switch to another room
  /name <name>   change your display name
  /call          start a call with the room
  /hangup        end the current call
  /leave         leave the room
  /status        show session status
  /quit          exit
Anything else is sent as a chat message.";
