use std::io::BufRead;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// A user command, delivered to the peer through its intake channel. The
/// UI (stdin here, anything in tests) is just a producer on this queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register,
    Advertise,
    SendMessage(String),
}

impl Command {
    /// Parses one input line; anything unrecognized yields `None` and is
    /// the caller's warning to log.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "Register" => Some(Self::Register),
            "Advertise" => Some(Self::Advertise),
            line => match line.split_once(' ') {
                Some(("SendMessage", text)) if !text.is_empty() => {
                    Some(Self::SendMessage(text.to_string()))
                }
                _ => None,
            },
        }
    }
}

pub fn channel() -> (UnboundedSender<Command>, UnboundedReceiver<Command>) {
    unbounded_channel()
}

/// Feeds stdin lines into the command channel from a blocking thread, so
/// the async runtime never waits on the terminal.
pub fn spawn_stdin_intake(sender: UnboundedSender<Command>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };

            if line.trim().is_empty() {
                continue;
            }

            match Command::parse(&line) {
                Some(command) => {
                    if sender.send(command).is_err() {
                        break;
                    }
                }
                None => log::warn!("unknown command: line={line:?}"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_command_set() {
        assert_eq!(Command::parse("Register"), Some(Command::Register));
        assert_eq!(Command::parse(" Advertise "), Some(Command::Advertise));
        assert_eq!(
            Command::parse("SendMessage hello there"),
            Some(Command::SendMessage("hello there".to_string()))
        );

        assert_eq!(Command::parse("SendMessage"), None);
        assert_eq!(Command::parse("register"), None);
        assert_eq!(Command::parse("Quit"), None);
    }
}
