//! Collaborator traits for NAS Player
//!
//! The player core consumes these; implementations live with the platform
//! (database, HTTP client) and are injected at start-up.

use crate::error::Result;
use crate::types::{Playlist, Track};
use async_trait::async_trait;
use tokio::sync::watch;

/// Read-only stream of persisted playlists
///
/// Mutation goes through the persistence layer directly; the player only
/// surfaces the latest list next to playback state.
pub trait PlaylistFeed: Send + Sync {
    /// Subscribe to playlist updates (current value is available immediately)
    fn subscribe(&self) -> watch::Receiver<Vec<Playlist>>;
}

/// Lyric lookup for tracks that carry none
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Fetch lyric text for a track
    ///
    /// Returns `Ok(None)` when the provider has nothing for this track.
    ///
    /// # Errors
    /// Returns an error if the lookup itself failed
    async fn fetch(&self, track: &Track) -> Result<Option<String>>;
}

/// In-memory [`PlaylistFeed`] backed by a watch channel
///
/// Used by hosts without a database and by tests.
#[derive(Debug, Clone)]
pub struct StaticPlaylists {
    sender: watch::Sender<Vec<Playlist>>,
}

impl StaticPlaylists {
    /// Create a feed with an initial list
    pub fn new(playlists: Vec<Playlist>) -> Self {
        let (sender, _) = watch::channel(playlists);
        Self { sender }
    }

    /// Replace the published list
    pub fn publish(&self, playlists: Vec<Playlist>) {
        self.sender.send_replace(playlists);
    }
}

impl PlaylistFeed for StaticPlaylists {
    fn subscribe(&self) -> watch::Receiver<Vec<Playlist>> {
        self.sender.subscribe()
    }
}
