//! Softphone commands typed on stdin.

use ringline_common::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dial(Identity),
    Accept,
    Decline,
    HangUp,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "commands: dial <id> | accept | decline | hangup | status | help | quit";

impl Command {
    /// Parse one input line. `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "dial" | "call" => match words.next() {
                Some(target) => Command::Dial(Identity::from(target)),
                None => return Err("usage: dial <id>".into()),
            },
            "accept" | "answer" => Command::Accept,
            "decline" | "reject" => Command::Decline,
            "hangup" | "hang" | "end" => Command::HangUp,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dial_with_target() {
        assert_eq!(
            Command::parse("dial +200"),
            Ok(Some(Command::Dial("+200".into())))
        );
        assert_eq!(
            Command::parse("  CALL   +300 "),
            Ok(Some(Command::Dial("+300".into())))
        );
    }

    #[test]
    fn dial_requires_target() {
        assert!(Command::parse("dial").is_err());
    }

    #[test]
    fn parses_simple_verbs() {
        assert_eq!(Command::parse("accept"), Ok(Some(Command::Accept)));
        assert_eq!(Command::parse("decline"), Ok(Some(Command::Decline)));
        assert_eq!(Command::parse("hangup"), Ok(Some(Command::HangUp)));
        assert_eq!(Command::parse("status"), Ok(Some(Command::Status)));
        assert_eq!(Command::parse("quit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn blank_and_unknown() {
        assert_eq!(Command::parse("   "), Ok(None));
        assert_eq!(
            Command::parse("frobnicate"),
            Err("unknown command: frobnicate".into())
        );
    }
}
