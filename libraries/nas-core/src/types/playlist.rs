/// Playlist domain types
use super::ids::PlaylistId;
use super::track::Track;
use serde::{Deserialize, Serialize};

/// Persisted playlist record
///
/// Owned by the persistence collaborator; the player only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    /// Unique playlist identifier
    pub id: PlaylistId,

    /// Playlist name
    pub name: String,

    /// Tracks in playlist order
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Playlist {
    /// Create an empty playlist
    pub fn new(id: PlaylistId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tracks: Vec::new(),
        }
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if the playlist has no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
