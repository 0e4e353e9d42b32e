//! Console command parsing

use crate::error::{ConsoleError, Result};

/// One line of console input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Play library entry `n` (1-based), queueing the whole library
    Play(usize),
    Toggle,
    Next,
    Previous,
    Seek(u64),
    /// Jump to queue entry `n` (1-based)
    Skip(usize),
    Volume(f32),
    Reconnect,
    Status,
    Queue,
    Lyrics,
    Playlists,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play <n>       play library track n (queues the whole library)
  toggle | p     play/pause
  next | n       next track
  prev           restart or previous track
  seek <ms>      seek within the current track
  skip <n>       jump to queue entry n
  vol <0.0-1.0>  set volume
  reconnect      retry binding the backend
  status | s     show playback state
  queue | q      show the queue
  lyrics         show the current lyric line
  playlists      list playlists
  help           this text
  quit           exit";

impl Command {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if let Some(extra) = words.next() {
            return Err(ConsoleError::command(format!("unexpected argument '{extra}'")));
        }

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("play", Some(n)) => Self::Play(position(n)?),
            ("toggle" | "p", None) => Self::Toggle,
            ("next" | "n", None) => Self::Next,
            ("prev" | "previous", None) => Self::Previous,
            ("seek", Some(ms)) => Self::Seek(
                ms.parse()
                    .map_err(|_| ConsoleError::command(format!("invalid position '{ms}'")))?,
            ),
            ("skip", Some(n)) => Self::Skip(position(n)?),
            ("vol" | "volume", Some(level)) => Self::Volume(
                level
                    .parse()
                    .map_err(|_| ConsoleError::command(format!("invalid volume '{level}'")))?,
            ),
            ("reconnect", None) => Self::Reconnect,
            ("status" | "s", None) => Self::Status,
            ("queue" | "q", None) => Self::Queue,
            ("lyrics", None) => Self::Lyrics,
            ("playlists", None) => Self::Playlists,
            ("help" | "?", None) => Self::Help,
            ("quit" | "exit", None) => Self::Quit,
            _ => {
                return Err(ConsoleError::command(format!(
                    "could not parse '{}' (try 'help')",
                    line.trim()
                )))
            }
        };
        Ok(Some(command))
    }
}

/// 1-based position as typed by the user
fn position(raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConsoleError::command(format!("invalid position '{raw}'"))),
    }
}
