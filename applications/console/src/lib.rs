//! NAS Console Library
//!
//! Headless front end for the playback coordinator: reads commands from
//! stdin and drives the loopback backend.
//!
//! This library exposes the core components for testing purposes.

pub mod commands;
pub mod config;
pub mod error;
pub mod library;
pub mod shell;

// Re-export commonly used types for convenience
pub use commands::Command;
pub use config::ConsoleConfig;
pub use error::{ConsoleError, Result};
pub use shell::{Console, Outcome};
