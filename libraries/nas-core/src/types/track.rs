/// Track domain type
use super::ids::TrackId;
use super::source::SourceLocator;
use serde::{Deserialize, Serialize};

/// Playable track
///
/// Immutable once handed to the player; queues hold it behind an `Arc`.
/// Use [`Track::with_lyrics`] to derive an updated copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Album name
    pub album: String,

    /// Where the audio is read from
    pub source: SourceLocator,

    /// Artwork locator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,

    /// Embedded lyric text (plain or LRC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
}

impl Track {
    /// Create a track with minimal metadata
    pub fn new(id: TrackId, title: impl Into<String>, source: impl Into<SourceLocator>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            source: source.into(),
            artwork: None,
            lyrics: None,
        }
    }

    /// Set the artist name
    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    /// Set the album name
    pub fn album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    /// Set the artwork locator
    pub fn artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }

    /// Copy of this track carrying the given lyric text
    pub fn with_lyrics(&self, lyrics: impl Into<String>) -> Self {
        Self {
            lyrics: Some(lyrics.into()),
            ..self.clone()
        }
    }

    /// Check whether lyric text is embedded
    pub fn has_lyrics(&self) -> bool {
        self.lyrics.as_deref().is_some_and(|l| !l.trim().is_empty())
    }
}
