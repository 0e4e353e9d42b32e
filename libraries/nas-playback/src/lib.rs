//! NAS Player - Playback Coordination
//!
//! Keeps one observable playback state consistent while three timelines race:
//! user commands, the asynchronous binding of the native player, and events
//! the native player pushes back.
//!
//! This crate provides:
//! - Immutable queue model (replace, advance, jump)
//! - Token-guarded connection lifecycle (stale binds are discarded)
//! - Event relay (play state, item transitions, loudness effect rebinding)
//! - Position sampler (~60 Hz while playing)
//! - Coordinator facade with the command set and a `watch` snapshot
//! - Loopback backend for headless use and tests
//!
//! # Architecture
//!
//! The native player is platform-specific and lives behind
//! [`PlaybackBackend`] / [`BackendHandle`]. Nothing here decodes audio.
//!
//! # Example: Basic Playback
//!
//! ```rust
//! use nas_core::{SourceLocator, Track, TrackId};
//! use nas_playback::{LoopbackBackend, PlaybackConfig, PlaybackCoordinator};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator =
//!     PlaybackCoordinator::start(Arc::new(LoopbackBackend::default()), PlaybackConfig::default());
//!
//! let tracks: Vec<Arc<Track>> = (1..=3)
//!     .map(|id| {
//!         Arc::new(Track::new(
//!             TrackId::new(id).unwrap(),
//!             format!("Track {id}"),
//!             SourceLocator::new(format!("/music/{id}.flac")),
//!         ))
//!     })
//!     .collect();
//!
//! coordinator.play_track(&tracks[1], tracks.clone())?;
//!
//! let snapshot = coordinator.snapshot();
//! assert_eq!(snapshot.current_index(), 1);
//! assert_eq!(snapshot.current_track().unwrap().title, "Track 2");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod loopback;
pub mod queue;
pub mod relay;
pub mod sampler;
pub mod status;
pub mod types;
pub mod volume;

pub use backend::{
    BackendError, BackendHandle, BackendSession, ConnectError, EffectError, LoudnessEffect,
    LoudnessEffectFactory, PlaybackBackend,
};
pub use connection::{Completion, ConnectToken, ConnectionLifecycle, ConnectionState};
pub use coordinator::{PlaybackCoordinator, PlaybackCoordinatorBuilder};
pub use error::{PlaybackError, Result};
pub use events::BackendEvent;
pub use loopback::{BackendCommand, ConnectStep, LoopbackBackend, LoopbackEffects, LoopbackPlayer};
pub use queue::Queue;
pub use relay::{EventRelay, RelayFlow};
pub use sampler::PositionSampler;
pub use status::{PlaybackSnapshot, StatusStore};
pub use types::{AdvancePolicy, AudioSessionId, ConnectionStatus, PlaybackConfig};
pub use volume::Volume;
