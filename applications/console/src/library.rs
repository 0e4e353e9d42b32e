//! Track library and lyric lookup for the console

use crate::config::LibrarySettings;
use async_trait::async_trait;
use nas_core::{CoreError, LyricsProvider, Playlist, PlaylistId, SourceLocator, Track, TrackId};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Build tracks from configuration
///
/// Ids are derived from the source locator, so they stay stable across runs.
pub fn load_tracks(settings: &LibrarySettings) -> nas_core::Result<Vec<Arc<Track>>> {
    settings
        .tracks
        .iter()
        .map(|entry| {
            let source = entry.source.trim();
            if source.is_empty() {
                return Err(CoreError::invalid_input(format!(
                    "track '{}' has no source",
                    entry.title
                )));
            }
            let source = SourceLocator::new(source);
            let track = Track::new(TrackId::derive_from(source.as_str()), &entry.title, source)
                .artist(&entry.artist)
                .album(&entry.album);
            Ok(Arc::new(track))
        })
        .collect()
}

/// A single playlist holding the whole library
pub fn library_playlist(tracks: &[Arc<Track>]) -> Playlist {
    let mut playlist = Playlist::new(PlaylistId::new(1), "Library");
    playlist.tracks = tracks.iter().map(|t| Track::clone(t)).collect();
    playlist
}

/// Reads `<track>.lrc` next to local tracks
#[derive(Debug, Default, Clone, Copy)]
pub struct SidecarLyrics;

#[async_trait]
impl LyricsProvider for SidecarLyrics {
    async fn fetch(&self, track: &Track) -> nas_core::Result<Option<String>> {
        if !track.source.is_local() {
            return Ok(None);
        }

        let path = Path::new(track.source.as_str()).with_extension("lrc");
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                debug!(path = %path.display(), "Found sidecar lyrics");
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Err(CoreError::lyrics(
                format!("{} is not valid UTF-8", path.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
