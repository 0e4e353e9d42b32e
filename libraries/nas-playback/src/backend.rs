//! Backend adapter traits
//!
//! The native playback resource differs per platform. The coordinator only
//! talks to it through these traits:
//!
//! - [`PlaybackBackend`] binds asynchronously and hands back a
//!   [`BackendSession`] (command handle + event stream)
//! - [`BackendHandle`] takes fire-and-forget transport commands
//! - [`LoudnessEffectFactory`] / [`LoudnessEffect`] manage the gain effect
//!   attached to an audio session
//!
//! Locators are passed through exactly as received.

use async_trait::async_trait;
use nas_core::SourceLocator;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::BackendEvent;
use crate::types::AudioSessionId;

/// Bind failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// Playback service not reachable
    #[error("Playback service unavailable: {0}")]
    Unavailable(String),

    /// Service refused the bind
    #[error("Bind rejected: {0}")]
    Rejected(String),
}

/// Forwarded command failed inside the backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{command} failed: {reason}")]
pub struct BackendError {
    /// Command name
    pub command: &'static str,
    /// Backend-provided reason
    pub reason: String,
}

impl BackendError {
    /// Create a command failure
    pub fn new(command: &'static str, reason: impl Into<String>) -> Self {
        Self {
            command,
            reason: reason.into(),
        }
    }
}

/// Loudness effect failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EffectError {
    /// Platform has no loudness effect
    #[error("Loudness effect not supported")]
    Unsupported,

    /// Effect could not be created for the session
    #[error("Failed to create effect for session {session}: {reason}")]
    Create {
        /// Target session
        session: AudioSessionId,
        /// Platform reason
        reason: String,
    },

    /// Gain or enable flag rejected
    #[error("Failed to configure effect: {0}")]
    Configure(String),

    /// Effect could not be released
    #[error("Failed to release effect: {0}")]
    Release(String),
}

/// Command handle of a bound backend
///
/// Commands are synchronous and fire-and-forget: the resulting state
/// arrives later as [`BackendEvent`]s.
pub trait BackendHandle: Send + Sync {
    /// Stop playback (keeps the playlist)
    fn stop(&self) -> Result<(), BackendError>;

    /// Drop every item of the backend playlist
    fn clear(&self) -> Result<(), BackendError>;

    /// Append an item to the backend playlist
    fn enqueue(&self, source: &SourceLocator) -> Result<(), BackendError>;

    /// Prepare the playlist for playback
    fn prepare(&self) -> Result<(), BackendError>;

    /// Jump to an item and position
    fn seek_to_item(&self, index: usize, position_ms: u64) -> Result<(), BackendError>;

    /// Seek within the current item
    fn seek(&self, position_ms: u64) -> Result<(), BackendError>;

    /// Start or resume playback
    fn play(&self) -> Result<(), BackendError>;

    /// Pause playback
    fn pause(&self) -> Result<(), BackendError>;

    /// Move to the next item (no-op at the end)
    fn skip_next(&self) -> Result<(), BackendError>;

    /// Move to the previous item
    fn skip_previous(&self) -> Result<(), BackendError>;

    /// Set output level (0.0-1.0)
    fn set_volume(&self, level: f32) -> Result<(), BackendError>;

    /// Whether audio is being produced right now
    fn is_playing(&self) -> bool;

    /// Position within the current item
    fn position_ms(&self) -> u64;

    /// Duration of the current item, once known
    fn duration_ms(&self) -> Option<u64>;
}

/// A bound backend: command handle plus its event stream
pub struct BackendSession {
    /// Command handle
    pub handle: Arc<dyn BackendHandle>,
    /// Events in emission order; closing the channel means the session is gone
    pub events: mpsc::UnboundedReceiver<BackendEvent>,
}

impl std::fmt::Debug for BackendSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSession").finish_non_exhaustive()
    }
}

/// Native playback resource that can be bound asynchronously
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Bind to the resource
    ///
    /// May take arbitrarily long and may fail.
    async fn connect(&self) -> Result<BackendSession, ConnectError>;
}

/// Creates loudness effects for an audio session
#[cfg_attr(test, mockall::automock)]
pub trait LoudnessEffectFactory: Send + Sync {
    /// Create a (disabled) effect bound to `session`
    fn create(&self, session: AudioSessionId) -> Result<Box<dyn LoudnessEffect>, EffectError>;
}

/// A live gain effect attached to one audio session
#[cfg_attr(test, mockall::automock)]
pub trait LoudnessEffect: Send {
    /// Target gain in millibels
    fn set_target_gain(&mut self, gain_mb: i32) -> Result<(), EffectError>;

    /// Enable or disable processing
    fn set_enabled(&mut self, enabled: bool) -> Result<(), EffectError>;

    /// Release platform resources; the effect is unusable afterwards
    fn release(&mut self) -> Result<(), EffectError>;
}
