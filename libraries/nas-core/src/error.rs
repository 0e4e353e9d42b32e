/// Core error types for NAS Player
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for NAS Player
#[derive(Error, Debug)]
pub enum CoreError {
    /// Track ids are non-zero
    #[error("Invalid track id: {0}")]
    InvalidTrackId(u64),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Lyrics collaborator failure
    #[error("Lyrics error: {0}")]
    Lyrics(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a lyrics error
    pub fn lyrics(msg: impl Into<String>) -> Self {
        Self::Lyrics(msg.into())
    }
}
