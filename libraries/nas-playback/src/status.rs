//! Observable playback state
//!
//! `StatusStore` is the single writer-side of the snapshot the UI watches.
//! The relay, the sampler and command-time optimistic updates all go through
//! it; each `on_*` method applies one change under the channel's write lock
//! so subscribers never see a half-applied update.

use nas_core::{Track, TrackId};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{PlaybackError, Result};
use crate::queue::Queue;
use crate::types::ConnectionStatus;

/// UI-visible playback state
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    /// Queue and current position
    pub queue: Queue,

    /// Whether the backend is producing audio
    pub is_playing: bool,

    /// Position within the current track
    pub position_ms: u64,

    /// Duration of the current track (0 until known)
    pub duration_ms: u64,

    /// Output level (0.0-1.0)
    pub volume: f32,

    /// Backend connection status
    pub connection: ConnectionStatus,
}

impl PlaybackSnapshot {
    fn new(volume: f32) -> Self {
        Self {
            queue: Queue::new(),
            is_playing: false,
            position_ms: 0,
            duration_ms: 0,
            volume,
            connection: ConnectionStatus::Disconnected,
        }
    }

    /// Current track, always the queue entry at `current_index()`
    pub fn current_track(&self) -> Option<&Arc<Track>> {
        self.queue.current()
    }

    /// Current queue position
    pub fn current_index(&self) -> usize {
        self.queue.index()
    }
}

/// Serialized writer for [`PlaybackSnapshot`]
#[derive(Debug, Clone)]
pub struct StatusStore {
    sender: Arc<watch::Sender<PlaybackSnapshot>>,
}

impl StatusStore {
    /// Create a store with an empty queue
    pub fn new(initial_volume: f32) -> Self {
        let (sender, _) = watch::channel(PlaybackSnapshot::new(initial_volume));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.sender.subscribe()
    }

    /// Copy of the latest snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.sender.borrow().clone()
    }

    /// Length of the published queue
    pub fn queue_len(&self) -> usize {
        self.sender.borrow().queue.len()
    }

    /// Published volume
    pub fn volume(&self) -> f32 {
        self.sender.borrow().volume
    }

    /// New queue from a play command; position and duration restart
    pub fn on_queue_replaced(&self, queue: Queue) {
        self.sender.send_modify(|s| {
            s.queue = queue;
            s.position_ms = 0;
            s.duration_ms = 0;
        });
    }

    /// Backend play flag; returns whether it changed
    pub fn on_play_state(&self, playing: bool) -> bool {
        self.sender.send_if_modified(|s| {
            if s.is_playing == playing {
                return false;
            }
            s.is_playing = playing;
            true
        })
    }

    /// Backend moved to item `index`
    ///
    /// Position restarts when the index changes. Out-of-bounds indices leave the queue untouched and return the error.
    pub fn on_transition(&self, index: usize) -> Result<()> {
        let mut outcome = Ok(());
        self.sender.send_if_modified(|s| match s.queue.set_index(index) {
            Ok(_) if index == s.queue.index() => false,
            Ok((queue, _)) => {
                s.queue = queue;
                s.position_ms = 0;
                s.duration_ms = 0;
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    /// Sampled position; duration only when the backend knows it
    pub fn on_position(&self, position_ms: u64, duration_ms: Option<u64>) -> bool {
        self.sender.send_if_modified(|s| {
            let duration_ms = duration_ms.unwrap_or(s.duration_ms);
            if s.position_ms == position_ms && s.duration_ms == duration_ms {
                return false;
            }
            s.position_ms = position_ms;
            s.duration_ms = duration_ms;
            true
        })
    }

    /// Clamped volume level
    pub fn on_volume(&self, volume: f32) {
        self.sender.send_if_modified(|s| {
            if s.volume == volume {
                return false;
            }
            s.volume = volume;
            true
        });
    }

    /// Connection status change
    pub fn on_connection(&self, status: ConnectionStatus) {
        self.sender.send_if_modified(|s| {
            if s.connection == status {
                return false;
            }
            s.connection = status;
            true
        });
    }

    /// Attach lyrics to the current track if it is still `track_id`
    pub fn on_lyrics(&self, track_id: TrackId, lyrics: String) -> Result<()> {
        let mut outcome = Err(PlaybackError::TrackMismatch { expected: track_id });
        self.sender.send_if_modified(|s| {
            let Some(current) = s.queue.current() else {
                return false;
            };
            if current.id != track_id {
                return false;
            }
            let updated = Arc::new(current.with_lyrics(lyrics));
            match s.queue.with_current_replaced(updated) {
                Ok(queue) => {
                    s.queue = queue;
                    outcome = Ok(());
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });
        outcome
    }
}
