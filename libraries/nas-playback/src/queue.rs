//! Queue model
//!
//! Ordered tracks plus a current index. The queue is a value: every
//! operation returns a new `Queue` (or an error) and leaves `self` alone, so
//! a published snapshot can never be observed half-updated.
//!
//! ```text
//! tracks:  [A] [B] [C] [D]
//!                   ^
//!                 index = 2, current = C
//! ```
//!
//! When non-empty, `index < len` always holds. The queue is never cleared by
//! playback ending; it is only ever replaced.

use nas_core::{Track, TrackId};
use std::sync::Arc;

use crate::error::{PlaybackError, Result};
use crate::types::AdvancePolicy;

/// Ordered track list with a current position
#[derive(Debug, Clone, PartialEq)]
pub struct Queue {
    tracks: Arc<[Arc<Track>]>,
    index: usize,
}

impl Queue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            tracks: Arc::from(Vec::new()),
            index: 0,
        }
    }

    /// Build a queue from `tracks`, positioned on `start`
    ///
    /// Falls back to index 0 when `start` is not in the list. When ids
    /// repeat, the first occurrence wins.
    pub fn replace(tracks: Vec<Arc<Track>>, start: TrackId) -> Result<Self> {
        if tracks.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }

        let index = tracks.iter().position(|t| t.id == start).unwrap_or(0);

        Ok(Self {
            tracks: Arc::from(tracks),
            index,
        })
    }

    /// Move by `delta` entries
    ///
    /// `Clamp` stops at either end, `Wrap` continues from the other end.
    pub fn advance(&self, delta: isize, policy: AdvancePolicy) -> Result<(Self, Arc<Track>)> {
        if self.is_empty() {
            return Err(PlaybackError::OutOfRange);
        }

        let len = self.tracks.len() as isize;
        let current = self.index as isize;
        let index = match policy {
            AdvancePolicy::Clamp => current.saturating_add(delta).clamp(0, len - 1),
            AdvancePolicy::Wrap => (current + delta.rem_euclid(len)) % len,
        } as usize;

        self.set_index(index)
    }

    /// Jump to `index`
    pub fn set_index(&self, index: usize) -> Result<(Self, Arc<Track>)> {
        let track = self
            .tracks
            .get(index)
            .cloned()
            .ok_or(PlaybackError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            })?;

        let queue = Self {
            tracks: Arc::clone(&self.tracks),
            index,
        };
        Ok((queue, track))
    }

    /// Swap the current entry for an updated copy of the same track
    pub fn with_current_replaced(&self, track: Arc<Track>) -> Result<Self> {
        match self.current() {
            Some(current) if current.id == track.id => {
                let mut tracks = self.tracks.to_vec();
                tracks[self.index] = track;
                Ok(Self {
                    tracks: Arc::from(tracks),
                    index: self.index,
                })
            }
            _ => Err(PlaybackError::TrackMismatch { expected: track.id }),
        }
    }

    /// Current track (`None` when empty)
    pub fn current(&self) -> Option<&Arc<Track>> {
        self.tracks.get(self.index)
    }

    /// Current position (0 when empty)
    pub fn index(&self) -> usize {
        self.index
    }

    /// Track at `index`
    pub fn get(&self, index: usize) -> Option<&Arc<Track>> {
        self.tracks.get(index)
    }

    /// All tracks in order
    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}
