//! Core types for playback coordination

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Audio session identity reported by the backend
///
/// Opaque; only compared for equality. `0` means "no session".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioSessionId(u32);

impl AudioSessionId {
    /// The "no session" identity
    pub const NONE: Self = Self(0);

    /// Wrap a raw session id
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub fn get(self) -> u32 {
        self.0
    }

    /// Check for the "no session" identity
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AudioSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How relative queue moves behave at the ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvancePolicy {
    /// Stop at the first/last entry
    #[default]
    Clamp,

    /// Continue from the other end
    Wrap,
}

/// Connection status visible to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No backend bound
    #[default]
    Disconnected,

    /// Bind in flight
    Connecting,

    /// Commands are dispatched to the backend
    Connected,

    /// Last bind failed; waiting for an explicit reconnect
    Failed,
}

/// Configuration for the playback coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Position sampling period in milliseconds (default: 16, ~60 Hz for lyric sync)
    pub sample_interval_ms: u64,

    /// `previous()` restarts the current track past this position (default: 5000)
    pub restart_threshold_ms: u64,

    /// Loudness effect target gain in millibels (default: 30000)
    pub loudness_gain_mb: i32,

    /// Volume published before any command (0.0-1.0, default: 1.0)
    pub initial_volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 16,
            restart_threshold_ms: 5_000,
            loudness_gain_mb: 30_000,
            initial_volume: 1.0,
        }
    }
}

impl PlaybackConfig {
    /// Sampling period as a `Duration` (never zero)
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }
}
