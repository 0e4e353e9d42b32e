//! Command execution and state rendering

use crate::commands::{Command, HELP};
use crate::error::{ConsoleError, Result};
use nas_core::Track;
use nas_playback::{PlaybackCoordinator, PlaybackSnapshot};
use std::fmt::Write;
use std::sync::Arc;

/// Result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text to show; keep reading input
    Continue(String),
    Quit,
}

pub struct Console {
    coordinator: PlaybackCoordinator,
    library: Vec<Arc<Track>>,
}

impl Console {
    pub fn new(coordinator: PlaybackCoordinator, library: Vec<Arc<Track>>) -> Self {
        Self {
            coordinator,
            library,
        }
    }

    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    pub fn execute(&self, command: Command) -> Result<Outcome> {
        let coordinator = &self.coordinator;

        let output = match command {
            Command::Play(n) => {
                let track = n.checked_sub(1).and_then(|i| self.library.get(i)).ok_or_else(|| {
                    ConsoleError::command(format!(
                        "library has {} tracks, no track {n}",
                        self.library.len()
                    ))
                })?;
                coordinator.play_track(track, self.library.clone())?;
                format!("playing {}", describe(track))
            }
            Command::Toggle => {
                coordinator.toggle_play_pause();
                String::new()
            }
            Command::Next => {
                coordinator.next();
                String::new()
            }
            Command::Previous => {
                coordinator.previous();
                String::new()
            }
            Command::Seek(ms) => {
                coordinator.seek_to(ms);
                format!("seek to {}", format_time(ms))
            }
            Command::Skip(n) => {
                if let Some(index) = n.checked_sub(1) {
                    coordinator.skip_to_index(index);
                }
                String::new()
            }
            Command::Volume(level) => {
                coordinator.set_volume(level);
                format!("volume {:.0}%", coordinator.snapshot().volume * 100.0)
            }
            Command::Reconnect => {
                if coordinator.reconnect() {
                    "reconnecting".to_string()
                } else {
                    "already connected".to_string()
                }
            }
            Command::Status => render_status(&coordinator.snapshot()),
            Command::Queue => render_queue(&coordinator.snapshot()),
            Command::Lyrics => coordinator
                .active_lyric_line()
                .map(|line| line.text)
                .unwrap_or_else(|| "(no lyrics)".to_string()),
            Command::Playlists => {
                let playlists = coordinator.playlists();
                if playlists.is_empty() {
                    "(no playlists)".to_string()
                } else {
                    playlists
                        .iter()
                        .map(|p| format!("{} ({} tracks)", p.name, p.len()))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Outcome::Quit),
        };

        Ok(Outcome::Continue(output))
    }
}

fn describe(track: &Track) -> String {
    if track.artist.is_empty() {
        track.title.clone()
    } else {
        format!("{} - {}", track.artist, track.title)
    }
}

/// `m:ss`
pub fn format_time(ms: u64) -> String {
    let secs = ms / 1_000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// One-line summary of the playback state
pub fn render_status(snapshot: &PlaybackSnapshot) -> String {
    let state = if snapshot.is_playing { "playing" } else { "paused" };
    let track = snapshot
        .current_track()
        .map_or_else(|| "(nothing queued)".to_string(), |t| describe(t));

    format!(
        "[{state}] {track} {}/{} vol {:.0}% ({:?})",
        format_time(snapshot.position_ms),
        format_time(snapshot.duration_ms),
        snapshot.volume * 100.0,
        snapshot.connection,
    )
}

/// Queue listing with the current entry marked
pub fn render_queue(snapshot: &PlaybackSnapshot) -> String {
    if snapshot.queue.is_empty() {
        return "(queue empty)".to_string();
    }

    let mut out = String::new();
    for (i, track) in snapshot.queue.tracks().iter().enumerate() {
        let marker = if i == snapshot.current_index() { '>' } else { ' ' };
        let _ = writeln!(out, "{marker} {:>2}. {}", i + 1, describe(track));
    }
    out.trim_end().to_string()
}
