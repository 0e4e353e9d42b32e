//! NAS Player Core
//!
//! Platform-agnostic domain types and collaborator traits shared by the
//! playback coordinator and the platform hosts.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `SourceLocator`, `Playlist`
//! - **Collaborator Traits**: `PlaylistFeed` (persistence), `LyricsProvider`
//! - **Lyrics**: LRC parsing and position lookup
//! - **Error Handling**: `CoreError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use nas_core::{Track, TrackId};
//!
//! let track = Track::new(TrackId::new(1).unwrap(), "My Favorite Song", "/music/song.mp3")
//!     .artist("Artist Name");
//!
//! assert!(track.source.is_local());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod lyrics;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use lyrics::{LyricsLine, active_line, parse_lrc};
pub use traits::{LyricsProvider, PlaylistFeed, StaticPlaylists};
pub use types::{LocatorKind, Playlist, PlaylistId, SourceLocator, Track, TrackId};
