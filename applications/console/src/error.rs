/// Console error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsoleError>;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid command: {0}")]
    Command(String),

    #[error("Playback error: {0}")]
    Playback(#[from] nas_playback::PlaybackError),

    #[error("Core error: {0}")]
    Core(#[from] nas_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }
}
