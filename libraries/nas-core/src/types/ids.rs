/// ID types for NAS Player entities
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;

use crate::error::{CoreError, Result};

/// Track identifier
///
/// Always non-zero. Catalog entries arrive with numeric ids; entries that
/// lack one (id `0`) get an id derived from their source locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(NonZeroU64);

impl TrackId {
    /// Create a track ID, rejecting zero
    pub fn new(id: u64) -> Result<Self> {
        NonZeroU64::new(id)
            .map(Self)
            .ok_or(CoreError::InvalidTrackId(id))
    }

    /// Derive a stable ID from a source locator (FNV-1a)
    pub fn derive_from(locator: &str) -> Self {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0100_0000_01b3;

        let hash = locator
            .bytes()
            .fold(OFFSET, |acc, b| (acc ^ u64::from(b)).wrapping_mul(PRIME));

        // Zero is reserved for "no id"
        Self(NonZeroU64::new(hash).unwrap_or(NonZeroU64::MIN))
    }

    /// Get the raw value
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playlist identifier (assigned by the persistence collaborator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(i64);

impl PlaylistId {
    /// Create a new playlist ID
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
