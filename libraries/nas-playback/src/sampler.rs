//! Position sampler
//!
//! Polls the bound backend at a fixed period and publishes position and
//! duration while it is playing. Missed ticks are skipped, never bunched.

use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::trace;

use crate::connection::{live_handle, SharedConnection};
use crate::status::StatusStore;

/// Periodic position publisher
pub struct PositionSampler {
    store: StatusStore,
    connection: SharedConnection,
    period: Duration,
}

impl PositionSampler {
    pub(crate) fn new(store: StatusStore, connection: SharedConnection, period: Duration) -> Self {
        Self {
            store,
            connection,
            period,
        }
    }

    /// Take one sample; returns whether anything was published
    pub fn sample_once(&self) -> bool {
        let Some(handle) = live_handle(&self.connection) else {
            return false;
        };
        if !handle.is_playing() {
            return false;
        }

        let position_ms = handle.position_ms();
        let duration_ms = handle.duration_ms();
        trace!(position_ms, ?duration_ms, "Sampled position");
        self.store.on_position(position_ms, duration_ms)
    }

    /// Sample forever
    pub async fn run(self) {
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.sample_once();
        }
    }
}
