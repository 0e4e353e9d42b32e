//! Error types for playback coordination

use nas_core::TrackId;
use thiserror::Error;

use crate::backend::{BackendError, ConnectError, EffectError};

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// A queue cannot be built from an empty track list
    #[error("Queue is empty")]
    EmptyQueue,

    /// Relative move on an empty queue
    #[error("Queue position out of range")]
    OutOfRange,

    /// Index outside the queue bounds
    #[error("Index {index} out of range for queue of {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Queue length at the time of the request
        len: usize,
    },

    /// Update addressed a track that is no longer current
    #[error("Track {expected} is not the current track")]
    TrackMismatch {
        /// Track the update was meant for
        expected: TrackId,
    },

    /// Backend bind rejected
    #[error("Backend bind failed: {0}")]
    BindFailure(#[from] ConnectError),

    /// Loudness effect could not be created or torn down
    #[error("Loudness effect failure: {0}")]
    EffectCreationFailure(#[from] EffectError),

    /// A forwarded command failed inside the backend
    #[error("Backend command failed: {0}")]
    BackendCommandFailure(#[from] BackendError),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
