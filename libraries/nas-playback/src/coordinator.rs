//! Playback coordinator
//!
//! Facade tying the queue, the connection lifecycle, the event relay and the
//! position sampler together. Commands are synchronous and fire-and-forget
//! against the backend; results come back as events and land in the
//! snapshot the UI watches.
//!
//! # Tasks
//!
//! | Task | Lifetime |
//! |---|---|
//! | connect | one per attempt |
//! | relay | one per live connection |
//! | sampler | coordinator |
//! | lyrics follower | coordinator (only with a `LyricsProvider`) |
//!
//! All of them are aborted when the coordinator is shut down or dropped.
//!
//! Command forwarding and the restore after a bind both hold the dispatch
//! lock, so a command can never interleave with the queue being restored
//! into a fresh backend. Shutdown takes it too.

use nas_core::{
    active_line, parse_lrc, LyricsLine, LyricsProvider, Playlist, PlaylistFeed, Track, TrackId,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::backend::{
    BackendError, BackendHandle, BackendSession, ConnectError, LoudnessEffectFactory,
    PlaybackBackend,
};
use crate::connection::{
    live_handle, Completion, ConnectToken, ConnectionLifecycle, SharedConnection,
};
use crate::error::{PlaybackError, Result};
use crate::events::BackendEvent;
use crate::queue::Queue;
use crate::relay::EventRelay;
use crate::sampler::PositionSampler;
use crate::status::{PlaybackSnapshot, StatusStore};
use crate::types::{ConnectionStatus, PlaybackConfig};
use crate::volume::Volume;

/// Builder for [`PlaybackCoordinator`]
pub struct PlaybackCoordinatorBuilder {
    backend: Arc<dyn PlaybackBackend>,
    config: PlaybackConfig,
    effects: Option<Arc<dyn LoudnessEffectFactory>>,
    playlists: Option<Arc<dyn PlaylistFeed>>,
    lyrics: Option<Arc<dyn LyricsProvider>>,
}

impl PlaybackCoordinatorBuilder {
    /// Override the default configuration
    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind a loudness effect to every audio session
    pub fn effects(mut self, effects: Arc<dyn LoudnessEffectFactory>) -> Self {
        self.effects = Some(effects);
        self
    }

    /// Surface persisted playlists
    pub fn playlists(mut self, feed: Arc<dyn PlaylistFeed>) -> Self {
        self.playlists = Some(feed);
        self
    }

    /// Fetch lyrics for tracks that have none embedded
    pub fn lyrics(mut self, provider: Arc<dyn LyricsProvider>) -> Self {
        self.lyrics = Some(provider);
        self
    }

    /// Spawn the background tasks and start connecting
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> PlaybackCoordinator {
        let volume = Volume::new(self.config.initial_volume).unwrap_or_default();
        let store = StatusStore::new(volume.get());
        let connection: SharedConnection = Arc::new(Mutex::new(ConnectionLifecycle::new()));

        let shared = Arc::new(Shared {
            backend: self.backend,
            effects: self.effects,
            connection: Arc::clone(&connection),
            store: store.clone(),
            config: self.config,
            dispatch: Mutex::new(()),
            tasks: Mutex::new(Tasks::default()),
        });

        let sampler =
            PositionSampler::new(store.clone(), connection, shared.config.sample_interval());
        shared.track_background(tokio::spawn(sampler.run()));

        if let Some(provider) = self.lyrics {
            shared.track_background(tokio::spawn(follow_lyrics(store, provider)));
        }

        shared.begin_connect(false);

        PlaybackCoordinator {
            shared,
            playlists: self.playlists.map(|feed| feed.subscribe()),
        }
    }
}

#[derive(Default)]
struct Tasks {
    connects: Vec<JoinHandle<()>>,
    relay: Option<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        for task in self
            .connects
            .drain(..)
            .chain(self.relay.take())
            .chain(self.background.drain(..))
        {
            task.abort();
        }
    }
}

struct Shared {
    backend: Arc<dyn PlaybackBackend>,
    effects: Option<Arc<dyn LoudnessEffectFactory>>,
    connection: SharedConnection,
    store: StatusStore,
    config: PlaybackConfig,
    /// Serializes access to the bound handle; taken before `connection`
    dispatch: Mutex<()>,
    tasks: Mutex<Tasks>,
}

impl Shared {
    fn connection(&self) -> MutexGuard<'_, ConnectionLifecycle<Arc<dyn BackendHandle>>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn track_background(&self, task: JoinHandle<()>) {
        self.tasks().background.push(task);
    }

    /// Start a connect attempt; `unless_connected` refuses while bound
    fn begin_connect(self: &Arc<Self>, unless_connected: bool) -> Option<ConnectToken> {
        let token = {
            let mut connection = self.connection();
            if unless_connected && connection.status() == ConnectionStatus::Connected {
                return None;
            }
            let token = connection.begin();
            self.store.on_connection(connection.status());
            token
        };
        info!(%token, "Connecting to playback backend");

        let shared = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = shared.backend.connect().await;
            shared.finish_connect(token, result);
        });

        let mut tasks = self.tasks();
        tasks.connects.retain(|t| !t.is_finished());
        tasks.connects.push(task);
        Some(token)
    }

    fn complete(
        &self,
        token: ConnectToken,
        result: std::result::Result<Arc<dyn BackendHandle>, ConnectError>,
    ) -> Completion {
        let mut connection = self.connection();
        let completion = connection.complete(token, result);
        self.store.on_connection(connection.status());
        completion
    }

    fn finish_connect(
        self: &Arc<Self>,
        token: ConnectToken,
        result: std::result::Result<BackendSession, ConnectError>,
    ) {
        match result {
            Err(e) => match self.complete(token, Err(e.clone())) {
                Completion::Failed => {
                    error!(%token, error = %PlaybackError::BindFailure(e), "Backend bind failed");
                }
                _ => debug!(%token, error = %e, "Discarding superseded bind failure"),
            },
            Ok(BackendSession { handle, events }) => {
                let _dispatch = self.dispatch();
                if self.complete(token, Ok(Arc::clone(&handle))) != Completion::Connected {
                    debug!(%token, "Discarding superseded bind");
                    return;
                }
                info!(%token, "Playback backend connected");
                self.spawn_relay(token, events);
                self.restore(handle.as_ref());
            }
        }
    }

    fn spawn_relay(
        self: &Arc<Self>,
        token: ConnectToken,
        events: mpsc::UnboundedReceiver<BackendEvent>,
    ) {
        let relay = EventRelay::new(
            self.store.clone(),
            self.effects.clone(),
            self.config.loudness_gain_mb,
        );
        let shared = Arc::clone(self);
        let task = tokio::spawn(async move {
            relay.run(events).await;
            shared.lose(token);
        });

        if let Some(previous) = self.tasks().relay.replace(task) {
            previous.abort();
        }
    }

    fn lose(&self, token: ConnectToken) {
        let mut connection = self.connection();
        if connection.lose(token) {
            self.store.on_connection(connection.status());
            warn!(%token, "Playback backend disconnected");
        } else {
            debug!(%token, "Ignoring loss of superseded connection");
        }
    }

    /// Push the published volume and queue into a freshly bound backend
    fn restore(&self, handle: &dyn BackendHandle) {
        let snapshot = self.store.snapshot();

        if let Err(e) = handle.set_volume(snapshot.volume) {
            warn!(error = %PlaybackError::from(e), "Failed to restore volume");
        }
        if snapshot.queue.is_empty() {
            return;
        }

        match load_queue(handle, &snapshot.queue, snapshot.position_ms) {
            Ok(()) => info!(
                len = snapshot.queue.len(),
                index = snapshot.queue.index(),
                "Restored queue into backend"
            ),
            Err(e) => warn!(error = %PlaybackError::from(e), "Failed to restore queue"),
        }
    }
}

/// Load `queue` into the backend, positioned but not playing
fn load_queue(
    handle: &dyn BackendHandle,
    queue: &Queue,
    position_ms: u64,
) -> std::result::Result<(), BackendError> {
    handle.stop()?;
    handle.clear()?;
    for track in queue.tracks() {
        handle.enqueue(&track.source)?;
    }
    handle.prepare()?;
    handle.seek_to_item(queue.index(), position_ms)
}

/// Fetch lyrics whenever the current track changes to one without them
async fn follow_lyrics(store: StatusStore, provider: Arc<dyn LyricsProvider>) {
    let mut updates = store.subscribe();
    let mut fetches = JoinSet::new();
    let mut last_seen: Option<TrackId> = None;

    loop {
        let current = updates.borrow_and_update().current_track().cloned();
        let current_id = current.as_ref().map(|t| t.id);

        if current_id != last_seen {
            last_seen = current_id;
            if let Some(track) = current.filter(|t| !t.has_lyrics()) {
                fetches.spawn(fetch_lyrics(store.clone(), Arc::clone(&provider), track));
            }
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            Some(_) = fetches.join_next(), if !fetches.is_empty() => {}
        }
    }
}

async fn fetch_lyrics(store: StatusStore, provider: Arc<dyn LyricsProvider>, track: Arc<Track>) {
    match provider.fetch(&track).await {
        Ok(Some(text)) if !text.trim().is_empty() => match store.on_lyrics(track.id, text) {
            Ok(()) => info!(track = %track.id, "Lyrics attached"),
            Err(e) => debug!(track = %track.id, error = %e, "Dropping lyrics for previous track"),
        },
        Ok(_) => debug!(track = %track.id, "No lyrics found"),
        Err(e) => warn!(track = %track.id, error = %e, "Lyrics fetch failed"),
    }
}

/// Coordinates a native playback backend with an observable state
///
/// # Example
///
/// ```rust
/// use nas_playback::{LoopbackBackend, PlaybackCoordinator, PlaybackConfig};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let coordinator =
///     PlaybackCoordinator::start(Arc::new(LoopbackBackend::default()), PlaybackConfig::default());
///
/// coordinator.set_volume(1.7);
/// assert_eq!(coordinator.snapshot().volume, 1.0);
/// # }
/// ```
pub struct PlaybackCoordinator {
    shared: Arc<Shared>,
    playlists: Option<watch::Receiver<Vec<Playlist>>>,
}

impl PlaybackCoordinator {
    /// Configure a coordinator for `backend`
    pub fn builder(backend: Arc<dyn PlaybackBackend>) -> PlaybackCoordinatorBuilder {
        PlaybackCoordinatorBuilder {
            backend,
            config: PlaybackConfig::default(),
            effects: None,
            playlists: None,
            lyrics: None,
        }
    }

    /// Start a coordinator without optional collaborators
    pub fn start(backend: Arc<dyn PlaybackBackend>, config: PlaybackConfig) -> Self {
        Self::builder(backend).config(config).start()
    }

    fn handle(&self) -> Option<Arc<dyn BackendHandle>> {
        live_handle(&self.shared.connection)
    }

    /// Run `f` against the live backend; dropped when not connected
    fn forward<F>(&self, command: &'static str, f: F)
    where
        F: FnOnce(&dyn BackendHandle) -> std::result::Result<(), BackendError>,
    {
        let _dispatch = self.shared.dispatch();
        let Some(handle) = self.handle() else {
            debug!(command, "Not connected, command not forwarded");
            return;
        };
        if let Err(e) = f(handle.as_ref()) {
            warn!(command, error = %PlaybackError::from(e), "Backend command failed");
        }
    }

    // ===== Commands =====

    /// Replace the queue with `tracks` and play from `track`
    ///
    /// Starts from the first entry when `track` is not in the list.
    pub fn play_track(&self, track: &Track, tracks: Vec<Arc<Track>>) -> Result<()> {
        let queue = Queue::replace(tracks, track.id)?;
        info!(
            track = %track.id,
            index = queue.index(),
            len = queue.len(),
            "Playing from new queue"
        );

        self.shared.store.on_queue_replaced(queue.clone());
        self.forward("play_track", |h| {
            load_queue(h, &queue, 0)?;
            h.play()
        });
        Ok(())
    }

    /// Pause if the backend is playing, play otherwise
    pub fn toggle_play_pause(&self) {
        self.forward("toggle_play_pause", |h| {
            if h.is_playing() {
                h.pause()
            } else {
                h.play()
            }
        });
    }

    /// Skip to the next item
    pub fn next(&self) {
        self.forward("next", |h| h.skip_next());
    }

    /// Restart the track, or go to the previous one near its start
    pub fn previous(&self) {
        let threshold = self.shared.config.restart_threshold_ms;
        self.forward("previous", |h| {
            if h.position_ms() > threshold {
                h.seek(0)
            } else {
                h.skip_previous()
            }
        });
    }

    /// Seek within the current track
    pub fn seek_to(&self, position_ms: u64) {
        self.forward("seek_to", |h| h.seek(position_ms));
    }

    /// Jump to queue entry `index` and make sure it plays
    ///
    /// Indices outside the queue are ignored.
    pub fn skip_to_index(&self, index: usize) {
        let len = self.shared.store.queue_len();
        if index >= len {
            debug!(index, len, "Ignoring skip outside the queue");
            return;
        }

        self.forward("skip_to_index", |h| {
            h.seek_to_item(index, 0)?;
            if h.is_playing() {
                Ok(())
            } else {
                h.play()
            }
        });
    }

    /// Set the output level, clamped to `[0.0, 1.0]`
    ///
    /// NaN is ignored.
    pub fn set_volume(&self, level: f32) {
        let Some(volume) = Volume::new(level) else {
            debug!("Ignoring NaN volume");
            return;
        };
        self.shared.store.on_volume(volume.get());
        self.forward("set_volume", |h| h.set_volume(volume.get()));
    }

    /// Start a new connect attempt unless already connected
    ///
    /// A pending attempt is superseded. Returns `false` when connected.
    pub fn reconnect(&self) -> bool {
        self.shared.begin_connect(true).is_some()
    }

    /// Attach lyrics to the current track
    ///
    /// Fails with `TrackMismatch` if `track_id` is no longer current.
    pub fn attach_lyrics(&self, track_id: TrackId, lyrics: impl Into<String>) -> Result<()> {
        self.shared.store.on_lyrics(track_id, lyrics.into())
    }

    // ===== Queries =====

    /// Watch the playback state
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.shared.store.subscribe()
    }

    /// Latest playback state
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.store.snapshot()
    }

    /// Current connection status
    pub fn connection_status(&self) -> ConnectionStatus {
        self.shared.connection().status()
    }

    /// Reason of the last bind failure, while failed
    pub fn connection_failure(&self) -> Option<String> {
        self.shared.connection().failure().map(str::to_owned)
    }

    /// Persisted playlists (empty without a feed)
    pub fn playlists(&self) -> Vec<Playlist> {
        self.playlists
            .as_ref()
            .map(|rx| rx.borrow().clone())
            .unwrap_or_default()
    }

    /// Watch persisted playlists
    pub fn subscribe_playlists(&self) -> Option<watch::Receiver<Vec<Playlist>>> {
        self.playlists.clone()
    }

    /// Parsed lyrics of the current track
    pub fn lyrics(&self) -> Vec<LyricsLine> {
        self.snapshot()
            .current_track()
            .and_then(|t| t.lyrics.as_deref())
            .map(parse_lrc)
            .unwrap_or_default()
    }

    /// Lyric line for the current position
    pub fn active_lyric_line(&self) -> Option<LyricsLine> {
        let snapshot = self.snapshot();
        let lines = snapshot
            .current_track()
            .and_then(|t| t.lyrics.as_deref())
            .map(parse_lrc)?;
        let index = active_line(&lines, snapshot.position_ms)?;
        lines.into_iter().nth(index)
    }

    /// Abort every background task and release the backend
    ///
    /// Further commands are dropped as if disconnected.
    pub fn shutdown(&self) {
        let _dispatch = self.shared.dispatch();
        {
            let mut connection = self.shared.connection();
            if connection.disconnect().is_some() {
                info!("Playback backend released");
            }
            self.shared.store.on_connection(connection.status());
        }

        // Pending binds are stale now and can no longer spawn a relay
        self.shared.tasks().abort_all();
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
