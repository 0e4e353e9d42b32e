//! Volume level handling
//!
//! The backend takes a linear level in `[0.0, 1.0]`; any perceptual curve is
//! the native player's business.

/// Volume level, always within `[0.0, 1.0]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Volume(f32);

impl Volume {
    /// Silence
    pub const MIN: Self = Self(0.0);

    /// Unity gain
    pub const MAX: Self = Self(1.0);

    /// Clamp a requested level into range
    ///
    /// Returns `None` for NaN, which has no meaningful clamp.
    pub fn new(level: f32) -> Option<Self> {
        if level.is_nan() {
            None
        } else {
            Some(Self(level.clamp(0.0, 1.0)))
        }
    }

    /// Get the level
    pub fn get(self) -> f32 {
        self.0
    }

    /// Check if silent
    pub fn is_muted(self) -> bool {
        self.0 == 0.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::MAX
    }
}
