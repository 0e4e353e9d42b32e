//! Event relay
//!
//! Applies backend events to the status store in arrival order and keeps the
//! loudness effect bound to the live audio session. At most one effect is
//! live; it is released on session change, on session loss and when the
//! relay is dropped.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::{LoudnessEffect, LoudnessEffectFactory};
use crate::error::PlaybackError;
use crate::events::BackendEvent;
use crate::status::StatusStore;
use crate::types::AudioSessionId;

/// What the event loop should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFlow {
    /// Keep consuming
    Continue,

    /// Session is gone; stop
    SessionLost,
}

struct BoundEffect {
    session: AudioSessionId,
    effect: Box<dyn LoudnessEffect>,
}

/// Consumes backend events for one connection
pub struct EventRelay {
    store: StatusStore,
    effects: Option<Arc<dyn LoudnessEffectFactory>>,
    gain_mb: i32,
    session: AudioSessionId,
    bound: Option<BoundEffect>,
}

impl EventRelay {
    /// Create a relay publishing into `store`
    ///
    /// Without an effect factory, session changes are only tracked.
    pub fn new(
        store: StatusStore,
        effects: Option<Arc<dyn LoudnessEffectFactory>>,
        gain_mb: i32,
    ) -> Self {
        Self {
            store,
            effects,
            gain_mb,
            session: AudioSessionId::NONE,
            bound: None,
        }
    }

    /// Session the live effect is bound to
    pub fn effect_session(&self) -> Option<AudioSessionId> {
        self.bound.as_ref().map(|b| b.session)
    }

    /// Apply one event
    pub fn handle(&mut self, event: BackendEvent) -> RelayFlow {
        match event {
            BackendEvent::PlayStateChanged(playing) => {
                if self.store.on_play_state(playing) {
                    debug!(playing, "Play state changed");
                }
            }
            BackendEvent::MediaItemTransition { index } => {
                if let Err(e) = self.store.on_transition(index) {
                    debug!(index, error = %e, "Ignoring transition outside the queue");
                }
            }
            BackendEvent::AudioSessionChanged(session) => self.rebind(session),
            BackendEvent::SessionLost => {
                info!("Backend session lost");
                self.release();
                return RelayFlow::SessionLost;
            }
        }
        RelayFlow::Continue
    }

    /// Consume events until the session is lost or the stream closes
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<BackendEvent>) {
        while let Some(event) = events.recv().await {
            if self.handle(event) == RelayFlow::SessionLost {
                return;
            }
        }
        debug!("Backend event stream closed");
        self.release();
    }

    fn rebind(&mut self, session: AudioSessionId) {
        if session == self.session {
            debug!(%session, "Audio session unchanged");
            return;
        }
        self.session = session;
        self.release();

        if session.is_none() {
            return;
        }
        let Some(factory) = self.effects.clone() else {
            return;
        };

        match self.create_effect(factory.as_ref(), session) {
            Ok(effect) => {
                info!(%session, gain_mb = self.gain_mb, "Loudness effect bound");
                self.bound = Some(BoundEffect { session, effect });
            }
            Err(e) => warn!(%session, error = %e, "Loudness effect unavailable"),
        }
    }

    fn create_effect(
        &self,
        factory: &dyn LoudnessEffectFactory,
        session: AudioSessionId,
    ) -> Result<Box<dyn LoudnessEffect>, PlaybackError> {
        let mut effect = factory.create(session)?;

        let configured = effect
            .set_target_gain(self.gain_mb)
            .and_then(|()| effect.set_enabled(true));

        if let Err(e) = configured {
            if let Err(release) = effect.release() {
                warn!(%session, error = %release, "Failed to release half-built effect");
            }
            return Err(e.into());
        }
        Ok(effect)
    }

    fn release(&mut self) {
        let Some(mut bound) = self.bound.take() else {
            return;
        };
        match bound.effect.release() {
            Ok(()) => debug!(session = %bound.session, "Loudness effect released"),
            Err(e) => warn!(
                session = %bound.session,
                error = %PlaybackError::EffectCreationFailure(e),
                "Failed to release loudness effect"
            ),
        }
    }
}

impl Drop for EventRelay {
    fn drop(&mut self) {
        self.release();
    }
}
