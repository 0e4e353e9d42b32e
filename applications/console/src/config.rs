/// Console configuration
use crate::error::{ConsoleError, Result};
use nas_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub loopback: LoopbackSettings,

    #[serde(default)]
    pub library: LibrarySettings,
}

/// Simulated backend behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoopbackSettings {
    #[serde(default = "default_track_duration_ms")]
    pub track_duration_ms: u64,

    #[serde(default)]
    pub connect_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibrarySettings {
    #[serde(default = "default_tracks")]
    pub tracks: Vec<LibraryTrack>,

    /// Look for `.lrc` files next to local tracks
    #[serde(default = "default_sidecar_lyrics")]
    pub sidecar_lyrics: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LibraryTrack {
    pub title: String,

    #[serde(default)]
    pub artist: String,

    #[serde(default)]
    pub album: String,

    pub source: String,
}

impl ConsoleConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Environment variables use the `NAS_` prefix and `__` between
    /// sections, e.g. `NAS_LOOPBACK__TRACK_DURATION_MS=30000`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        let config_path = path.map_or_else(|| PathBuf::from("nas-console.toml"), Path::to_path_buf);
        if config_path.exists() {
            settings = settings.add_source(config::File::from(config_path));
        } else if let Some(path) = path {
            return Err(ConsoleError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("NAS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| ConsoleError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ConsoleError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;

        if playback.sample_interval_ms == 0 || playback.sample_interval_ms > 1_000 {
            return Err(ConsoleError::Config(format!(
                "playback.sample_interval_ms must be within 1..=1000, got {}",
                playback.sample_interval_ms
            )));
        }

        if !(0.0..=1.0).contains(&playback.initial_volume) {
            return Err(ConsoleError::Config(format!(
                "playback.initial_volume must be within 0.0..=1.0, got {}",
                playback.initial_volume
            )));
        }

        if self.loopback.track_duration_ms == 0 {
            return Err(ConsoleError::Config(
                "loopback.track_duration_ms must be positive".to_string(),
            ));
        }

        if let Some(track) = self.library.tracks.iter().find(|t| t.source.trim().is_empty()) {
            return Err(ConsoleError::Config(format!(
                "library track '{}' has no source",
                track.title
            )));
        }

        Ok(())
    }
}

// Default values
fn default_track_duration_ms() -> u64 {
    180_000
}

fn default_sidecar_lyrics() -> bool {
    true
}

fn default_tracks() -> Vec<LibraryTrack> {
    [
        ("Morning Static", "The Loopbacks", "/music/loopbacks/01-morning-static.flac"),
        ("Session Zero", "The Loopbacks", "/music/loopbacks/02-session-zero.flac"),
        ("Stale Token Blues", "Race Condition", "https://stream.example.com/race/stale-token.mp3"),
    ]
    .into_iter()
    .map(|(title, artist, source)| LibraryTrack {
        title: title.to_string(),
        artist: artist.to_string(),
        album: String::new(),
        source: source.to_string(),
    })
    .collect()
}

impl Default for LoopbackSettings {
    fn default() -> Self {
        Self {
            track_duration_ms: default_track_duration_ms(),
            connect_delay_ms: 0,
        }
    }
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            tracks: default_tracks(),
            sidecar_lyrics: default_sidecar_lyrics(),
        }
    }
}
