//! Loopback backend
//!
//! In-process stand-in for a native player. It produces no audio but keeps
//! the bookkeeping a real player would: an item list, a current item, a
//! play flag and a position clock. Every command is recorded so callers can
//! assert on what was forwarded.
//!
//! The clock runs on `tokio::time::Instant`, so tests with a paused runtime
//! control it exactly. Auto-advance to the next item happens lazily, when
//! the position or play flag is read.

use async_trait::async_trait;
use nas_core::SourceLocator;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::backend::{
    BackendError, BackendHandle, BackendSession, ConnectError, EffectError, LoudnessEffect,
    LoudnessEffectFactory, PlaybackBackend,
};
use crate::events::BackendEvent;
use crate::types::AudioSessionId;

/// Default simulated length of every item
pub const DEFAULT_ITEM_DURATION: Duration = Duration::from_secs(180);

/// Command forwarded to a loopback player
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    /// `stop`
    Stop,
    /// `clear`
    Clear,
    /// `enqueue`
    Enqueue(SourceLocator),
    /// `prepare`
    Prepare,
    /// `seek_to_item`
    SeekToItem {
        /// Target item
        index: usize,
        /// Target position
        position_ms: u64,
    },
    /// `seek`
    Seek(u64),
    /// `play`
    Play,
    /// `pause`
    Pause,
    /// `skip_next`
    SkipNext,
    /// `skip_previous`
    SkipPrevious,
    /// `set_volume`
    SetVolume(f32),
}

/// Scripted outcome of one `connect` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStep {
    /// Bind succeeds after `after`
    Succeed {
        /// Simulated bind latency
        after: Duration,
    },
    /// Bind fails after `after`
    Fail {
        /// Simulated bind latency
        after: Duration,
        /// Failure reason
        reason: String,
    },
}

impl ConnectStep {
    fn delay(&self) -> Duration {
        match self {
            Self::Succeed { after } | Self::Fail { after, .. } => *after,
        }
    }
}

#[derive(Default)]
struct BackendState {
    plan: VecDeque<ConnectStep>,
    default_delay: Duration,
    attempts: usize,
    players: Vec<Arc<LoopbackPlayer>>,
}

/// Reference [`PlaybackBackend`] running entirely in-process
#[derive(Clone)]
pub struct LoopbackBackend {
    item_duration: Duration,
    state: Arc<Mutex<BackendState>>,
}

impl LoopbackBackend {
    /// Create a backend whose items all last `item_duration`
    pub fn new(item_duration: Duration) -> Self {
        Self {
            item_duration,
            state: Arc::new(Mutex::new(BackendState::default())),
        }
    }

    /// Latency of connects that are not scripted
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.lock().default_delay = delay;
        self
    }

    /// Script the next connect attempts, in order
    pub fn with_connect_plan(self, steps: impl IntoIterator<Item = ConnectStep>) -> Self {
        self.lock().plan.extend(steps);
        self
    }

    /// Number of `connect` calls so far
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Player created by the `n`-th connect call (1-based)
    pub fn player(&self, attempt: usize) -> Option<Arc<LoopbackPlayer>> {
        self.lock()
            .players
            .iter()
            .find(|p| p.attempt == attempt)
            .cloned()
    }

    /// Most recently created player
    pub fn latest_player(&self) -> Option<Arc<LoopbackPlayer>> {
        self.lock().players.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LoopbackBackend {
    fn default() -> Self {
        Self::new(DEFAULT_ITEM_DURATION)
    }
}

#[async_trait]
impl PlaybackBackend for LoopbackBackend {
    async fn connect(&self) -> Result<BackendSession, ConnectError> {
        let (attempt, step) = {
            let mut state = self.lock();
            state.attempts += 1;
            let step = state.plan.pop_front().unwrap_or(ConnectStep::Succeed {
                after: state.default_delay,
            });
            (state.attempts, step)
        };

        debug!(attempt, ?step, "Loopback connect");
        let delay = step.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let ConnectStep::Fail { reason, .. } = step {
            return Err(ConnectError::Unavailable(reason));
        }

        let (events_tx, events) = mpsc::unbounded_channel();
        let player = Arc::new(LoopbackPlayer::new(attempt, self.item_duration, events_tx));
        self.lock().players.push(Arc::clone(&player));

        Ok(BackendSession {
            handle: player,
            events,
        })
    }
}

#[derive(Default)]
struct PlayerState {
    items: Vec<SourceLocator>,
    index: Option<usize>,
    playing: bool,
    base_position_ms: u64,
    resumed_at: Option<Instant>,
    session: AudioSessionId,
    sessions_issued: u32,
    volume: f32,
    failing: bool,
    log: Vec<BackendCommand>,
}

/// Simulated native player bound through [`LoopbackBackend`]
pub struct LoopbackPlayer {
    attempt: usize,
    item_duration_ms: u64,
    events: mpsc::UnboundedSender<BackendEvent>,
    state: Mutex<PlayerState>,
}

impl LoopbackPlayer {
    fn new(
        attempt: usize,
        item_duration: Duration,
        events: mpsc::UnboundedSender<BackendEvent>,
    ) -> Self {
        Self {
            attempt,
            item_duration_ms: (item_duration.as_millis() as u64).max(1),
            events,
            state: Mutex::new(PlayerState {
                volume: 1.0,
                ..Default::default()
            }),
        }
    }

    /// Connect attempt that created this player
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Commands received so far
    pub fn commands(&self) -> Vec<BackendCommand> {
        self.lock().log.clone()
    }

    /// Forget recorded commands
    pub fn clear_commands(&self) {
        self.lock().log.clear();
    }

    /// Locators currently loaded
    pub fn items(&self) -> Vec<SourceLocator> {
        self.lock().items.clone()
    }

    /// Current item
    pub fn current_index(&self) -> Option<usize> {
        let mut state = self.lock();
        self.settle(&mut state);
        state.index
    }

    /// Last level set through `set_volume`
    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    /// Live audio session
    pub fn session(&self) -> AudioSessionId {
        self.lock().session
    }

    /// Make every following command fail
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Simulate output rerouting: a fresh audio session
    pub fn reroute(&self) -> AudioSessionId {
        let mut state = self.lock();
        self.open_session(&mut state)
    }

    /// Simulate the service going away
    pub fn lose_session(&self) {
        self.emit(BackendEvent::SessionLost);
    }

    /// Push an arbitrary event, as a misbehaving backend might
    pub fn inject(&self, event: BackendEvent) {
        self.emit(event);
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: BackendEvent) {
        // Receiver gone means the session was dropped; nothing to notify
        let _ = self.events.send(event);
    }

    fn open_session(&self, state: &mut PlayerState) -> AudioSessionId {
        state.sessions_issued += 1;
        state.session = AudioSessionId::new(state.sessions_issued);
        self.emit(BackendEvent::AudioSessionChanged(state.session));
        state.session
    }

    /// Record `command`, failing it if requested
    fn accept(
        state: &mut PlayerState,
        command: BackendCommand,
        name: &'static str,
    ) -> Result<(), BackendError> {
        state.log.push(command);
        if state.failing {
            return Err(BackendError::new(name, "loopback player set to fail"));
        }
        Ok(())
    }

    fn position(state: &PlayerState, now: Instant) -> u64 {
        let elapsed = state
            .resumed_at
            .map(|at| now.saturating_duration_since(at).as_millis() as u64)
            .unwrap_or(0);
        state.base_position_ms + elapsed
    }

    /// Apply elapsed play time, advancing through items
    fn settle(&self, state: &mut PlayerState) {
        if state.resumed_at.is_none() {
            return;
        }
        let now = Instant::now();
        let mut position = Self::position(state, now);

        while position >= self.item_duration_ms {
            match state.index {
                Some(i) if i + 1 < state.items.len() => {
                    position -= self.item_duration_ms;
                    state.index = Some(i + 1);
                    self.emit(BackendEvent::MediaItemTransition { index: i + 1 });
                }
                _ => {
                    state.base_position_ms = self.item_duration_ms;
                    state.resumed_at = None;
                    state.playing = false;
                    self.emit(BackendEvent::PlayStateChanged(false));
                    return;
                }
            }
        }

        state.base_position_ms = position;
        state.resumed_at = Some(now);
    }

    fn set_position(state: &mut PlayerState, position_ms: u64) {
        state.base_position_ms = position_ms;
        state.resumed_at = state.playing.then(Instant::now);
    }

    fn jump(&self, state: &mut PlayerState, index: usize) {
        if state.index != Some(index) {
            state.index = Some(index);
            self.emit(BackendEvent::MediaItemTransition { index });
        }
        Self::set_position(state, 0);
    }
}

impl BackendHandle for LoopbackPlayer {
    fn stop(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::Stop, "stop")?;
        self.settle(&mut state);
        if state.playing {
            state.playing = false;
            self.emit(BackendEvent::PlayStateChanged(false));
        }
        state.base_position_ms = 0;
        state.resumed_at = None;
        Ok(())
    }

    fn clear(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::Clear, "clear")?;
        state.items.clear();
        state.index = None;
        Self::set_position(&mut state, 0);
        Ok(())
    }

    fn enqueue(&self, source: &SourceLocator) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::Enqueue(source.clone()), "enqueue")?;
        state.items.push(source.clone());
        if state.index.is_none() {
            state.index = Some(0);
        }
        Ok(())
    }

    fn prepare(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::Prepare, "prepare")?;
        if state.session.is_none() {
            self.open_session(&mut state);
        }
        Ok(())
    }

    fn seek_to_item(&self, index: usize, position_ms: u64) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(
            &mut state,
            BackendCommand::SeekToItem { index, position_ms },
            "seek_to_item",
        )?;
        if index >= state.items.len() {
            return Err(BackendError::new(
                "seek_to_item",
                format!("item {index} of {}", state.items.len()),
            ));
        }
        self.jump(&mut state, index);
        Self::set_position(&mut state, position_ms);
        Ok(())
    }

    fn seek(&self, position_ms: u64) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::Seek(position_ms), "seek")?;
        Self::set_position(&mut state, position_ms);
        Ok(())
    }

    fn play(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::Play, "play")?;
        if state.playing || state.index.is_none() {
            return Ok(());
        }
        if state.base_position_ms >= self.item_duration_ms {
            state.base_position_ms = 0;
        }
        state.playing = true;
        state.resumed_at = Some(Instant::now());
        self.emit(BackendEvent::PlayStateChanged(true));
        Ok(())
    }

    fn pause(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::Pause, "pause")?;
        self.settle(&mut state);
        if state.playing {
            state.playing = false;
            state.resumed_at = None;
            self.emit(BackendEvent::PlayStateChanged(false));
        }
        Ok(())
    }

    fn skip_next(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::SkipNext, "skip_next")?;
        self.settle(&mut state);
        if let Some(i) = state.index {
            if i + 1 < state.items.len() {
                self.jump(&mut state, i + 1);
            }
        }
        Ok(())
    }

    fn skip_previous(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::SkipPrevious, "skip_previous")?;
        self.settle(&mut state);
        match state.index {
            Some(i) if i > 0 => self.jump(&mut state, i - 1),
            _ => Self::set_position(&mut state, 0),
        }
        Ok(())
    }

    fn set_volume(&self, level: f32) -> Result<(), BackendError> {
        let mut state = self.lock();
        Self::accept(&mut state, BackendCommand::SetVolume(level), "set_volume")?;
        state.volume = level;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        let mut state = self.lock();
        self.settle(&mut state);
        state.playing
    }

    fn position_ms(&self) -> u64 {
        let mut state = self.lock();
        self.settle(&mut state);
        Self::position(&state, Instant::now())
    }

    fn duration_ms(&self) -> Option<u64> {
        self.lock().index.map(|_| self.item_duration_ms)
    }
}

#[derive(Default)]
struct EffectLedger {
    live: Vec<AudioSessionId>,
    created: usize,
    released: usize,
    fail_create: bool,
}

/// Loudness effects that only keep count
#[derive(Clone, Default)]
pub struct LoopbackEffects {
    ledger: Arc<Mutex<EffectLedger>>,
}

impl LoopbackEffects {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions with a live effect
    pub fn live_sessions(&self) -> Vec<AudioSessionId> {
        self.lock().live.clone()
    }

    /// Effects created so far
    pub fn created(&self) -> usize {
        self.lock().created
    }

    /// Effects released so far
    pub fn released(&self) -> usize {
        self.lock().released
    }

    /// Make creation fail
    pub fn set_fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    fn lock(&self) -> MutexGuard<'_, EffectLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LoudnessEffectFactory for LoopbackEffects {
    fn create(&self, session: AudioSessionId) -> Result<Box<dyn LoudnessEffect>, EffectError> {
        let mut ledger = self.lock();
        if ledger.fail_create {
            return Err(EffectError::Create {
                session,
                reason: "loopback effects set to fail".into(),
            });
        }
        ledger.created += 1;
        ledger.live.push(session);
        Ok(Box::new(LoopbackEffect {
            session,
            ledger: Arc::clone(&self.ledger),
            released: false,
        }))
    }
}

struct LoopbackEffect {
    session: AudioSessionId,
    ledger: Arc<Mutex<EffectLedger>>,
    released: bool,
}

impl LoudnessEffect for LoopbackEffect {
    fn set_target_gain(&mut self, _gain_mb: i32) -> Result<(), EffectError> {
        Ok(())
    }

    fn set_enabled(&mut self, _enabled: bool) -> Result<(), EffectError> {
        Ok(())
    }

    fn release(&mut self) -> Result<(), EffectError> {
        if self.released {
            return Err(EffectError::Release("already released".into()));
        }
        self.released = true;
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = ledger.live.iter().position(|s| *s == self.session) {
            ledger.live.remove(pos);
        }
        ledger.released += 1;
        Ok(())
    }
}
