//! Backend Events
//!
//! Events pushed by the native playback resource. They race with in-flight
//! commands and are applied by the relay in arrival order:
//! - Play/pause flips (including natural end of queue)
//! - Media item transitions (auto-advance, seeks, skips)
//! - Audio session changes (output rerouting, first prepare)
//! - Session loss (service killed, device unplugged)

use crate::types::AudioSessionId;

/// Events emitted by a bound backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    /// Backend started or stopped producing audio
    PlayStateChanged(bool),

    /// Backend moved to another item of its internal playlist
    MediaItemTransition {
        /// Position of the new item in the backend playlist
        index: usize,
    },

    /// Audio routing context changed; `AudioSessionId::NONE` means torn down
    AudioSessionChanged(AudioSessionId),

    /// The bound session went away; no further events follow
    SessionLost,
}

impl BackendEvent {
    /// Short name for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlayStateChanged(_) => "play_state",
            Self::MediaItemTransition { .. } => "transition",
            Self::AudioSessionChanged(_) => "audio_session",
            Self::SessionLost => "session_lost",
        }
    }
}
