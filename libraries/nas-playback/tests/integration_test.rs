//! Integration tests for the playback coordinator
//!
//! These tests drive the coordinator against the loopback backend with a
//! paused Tokio clock, covering real command/event races.
//! No shallow tests - every test verifies meaningful behavior.

use async_trait::async_trait;
use nas_core::{
    LyricsProvider, Playlist, PlaylistId, SourceLocator, StaticPlaylists, Track, TrackId,
};
use nas_playback::{
    AudioSessionId, BackendCommand, BackendError, BackendEvent, BackendHandle, BackendSession,
    ConnectError, ConnectStep, ConnectionStatus, LoopbackBackend, LoopbackEffects, LoopbackPlayer,
    PlaybackBackend, PlaybackConfig, PlaybackCoordinator, PlaybackError, PlaybackSnapshot,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

// ===== Test Helpers =====

const ITEM: Duration = Duration::from_secs(60);

fn create_tracks(count: u64) -> Vec<Arc<Track>> {
    (1..=count)
        .map(|id| {
            Arc::new(
                Track::new(
                    TrackId::new(id).unwrap(),
                    format!("Track {id}"),
                    SourceLocator::new(format!("/music/{id}.flac")),
                )
                .artist("Test Artist")
                .album("Test Album"),
            )
        })
        .collect()
}

fn locator(id: u64) -> SourceLocator {
    SourceLocator::new(format!("/music/{id}.flac"))
}

/// Let spawned tasks drain their queues without moving the clock
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

async fn wait_until(
    coordinator: &PlaybackCoordinator,
    condition: impl FnMut(&PlaybackSnapshot) -> bool,
) {
    coordinator
        .subscribe()
        .wait_for(condition)
        .await
        .expect("status store closed");
}

async fn connected(
    backend: &LoopbackBackend,
    effects: Option<&LoopbackEffects>,
) -> (PlaybackCoordinator, Arc<LoopbackPlayer>) {
    let mut builder = PlaybackCoordinator::builder(Arc::new(backend.clone()));
    if let Some(effects) = effects {
        builder = builder.effects(Arc::new(effects.clone()));
    }
    let coordinator = builder.start();

    wait_until(&coordinator, |s| s.connection == ConnectionStatus::Connected).await;
    let player = backend.latest_player().unwrap();
    player.clear_commands();
    (coordinator, player)
}

async fn playing_from(
    coordinator: &PlaybackCoordinator,
    tracks: &[Arc<Track>],
    start: usize,
) {
    coordinator
        .play_track(&tracks[start], tracks.to_vec())
        .unwrap();
    wait_until(coordinator, |s| s.is_playing).await;
}

struct ScriptedLyrics {
    texts: HashMap<u64, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedLyrics {
    fn new(delay: Duration, texts: &[(u64, &str)]) -> Self {
        Self {
            texts: texts
                .iter()
                .map(|(id, text)| (*id, (*text).to_string()))
                .collect(),
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LyricsProvider for ScriptedLyrics {
    async fn fetch(&self, track: &Track) -> nas_core::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.texts.get(&track.id.get()).cloned())
    }
}

// ===== Play Track =====

#[tokio::test(start_paused = true)]
async fn play_track_loads_queue_in_order_and_plays() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(3);

    coordinator.play_track(&tracks[1], tracks.clone()).unwrap();

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.current_index(), 1);
    assert_eq!(snapshot.current_track().unwrap().id.get(), 2);
    assert_eq!(snapshot.position_ms, 0);
    assert_eq!(snapshot.duration_ms, 0);

    assert_eq!(
        player.commands(),
        vec![
            BackendCommand::Stop,
            BackendCommand::Clear,
            BackendCommand::Enqueue(locator(1)),
            BackendCommand::Enqueue(locator(2)),
            BackendCommand::Enqueue(locator(3)),
            BackendCommand::Prepare,
            BackendCommand::SeekToItem {
                index: 1,
                position_ms: 0
            },
            BackendCommand::Play,
        ]
    );

    wait_until(&coordinator, |s| s.is_playing).await;
    assert_eq!(coordinator.snapshot().current_index(), 1);
}

#[tokio::test(start_paused = true)]
async fn play_track_missing_from_list_starts_at_first() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(3);
    let stranger = create_tracks(9).pop().unwrap();

    coordinator.play_track(&stranger, tracks).unwrap();

    assert_eq!(coordinator.snapshot().current_track().unwrap().id.get(), 1);
    assert!(player.commands().contains(&BackendCommand::SeekToItem {
        index: 0,
        position_ms: 0
    }));
}

#[tokio::test(start_paused = true)]
async fn play_track_with_empty_list_changes_nothing() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(2);
    playing_from(&coordinator, &tracks, 1).await;
    player.clear_commands();
    let before = coordinator.snapshot();

    let result = coordinator.play_track(&tracks[0], Vec::new());

    assert!(matches!(result, Err(PlaybackError::EmptyQueue)));
    assert_eq!(coordinator.snapshot(), before);
    assert!(player.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn backend_failures_do_not_break_optimistic_state() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    player.set_failing(true);
    let tracks = create_tracks(2);

    coordinator.play_track(&tracks[1], tracks.clone()).unwrap();
    coordinator.set_volume(0.5);
    settle().await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.current_track().unwrap().id.get(), 2);
    assert_eq!(snapshot.volume, 0.5);
    assert!(!snapshot.is_playing);
    assert_eq!(coordinator.connection_status(), ConnectionStatus::Connected);
}

// ===== Connection Lifecycle =====

#[tokio::test(start_paused = true)]
async fn commands_before_bind_are_restored_once_connected() {
    let backend = LoopbackBackend::new(ITEM).with_connect_delay(Duration::from_millis(50));
    let coordinator = PlaybackCoordinator::start(Arc::new(backend.clone()), PlaybackConfig::default());
    let tracks = create_tracks(3);

    coordinator.play_track(&tracks[2], tracks.clone()).unwrap();
    coordinator.set_volume(0.4);
    coordinator.next();

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.connection, ConnectionStatus::Connecting);
    assert_eq!(snapshot.current_index(), 2);
    assert_eq!(snapshot.volume, 0.4);

    wait_until(&coordinator, |s| s.connection == ConnectionStatus::Connected).await;
    settle().await;

    let player = backend.latest_player().unwrap();
    assert_eq!(player.volume(), 0.4);
    assert_eq!(player.items(), vec![locator(1), locator(2), locator(3)]);
    assert_eq!(player.current_index(), Some(2));
    assert!(!player.commands().contains(&BackendCommand::Play));
    assert!(!player.commands().contains(&BackendCommand::SkipNext));

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.current_index(), 2);
    assert!(!snapshot.is_playing);
}

#[tokio::test(start_paused = true)]
async fn superseded_bind_resolving_last_is_discarded() {
    let backend = LoopbackBackend::new(ITEM).with_connect_plan([
        ConnectStep::Succeed {
            after: Duration::from_millis(200),
        },
        ConnectStep::Succeed {
            after: Duration::from_millis(10),
        },
    ]);
    let coordinator = PlaybackCoordinator::start(Arc::new(backend.clone()), PlaybackConfig::default());
    settle().await;

    assert!(coordinator.reconnect());
    wait_until(&coordinator, |s| s.connection == ConnectionStatus::Connected).await;

    // Let the first, slower attempt resolve
    tokio::time::sleep(Duration::from_millis(300)).await;
    settle().await;

    assert_eq!(backend.attempts(), 2);
    assert_eq!(coordinator.connection_status(), ConnectionStatus::Connected);

    coordinator.set_volume(0.3);
    let newer = backend.player(2).unwrap();
    let older = backend.player(1).unwrap();
    assert_eq!(newer.volume(), 0.3);
    assert_eq!(older.volume(), 1.0);
    assert!(older.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn bind_failure_waits_for_explicit_reconnect() {
    let backend = LoopbackBackend::new(ITEM).with_connect_plan([ConnectStep::Fail {
        after: Duration::from_millis(5),
        reason: "service not running".into(),
    }]);
    let coordinator = PlaybackCoordinator::start(Arc::new(backend.clone()), PlaybackConfig::default());
    let tracks = create_tracks(2);

    wait_until(&coordinator, |s| s.connection == ConnectionStatus::Failed).await;
    assert!(coordinator
        .connection_failure()
        .unwrap()
        .contains("service not running"));

    // No automatic retry
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.attempts(), 1);

    coordinator.play_track(&tracks[1], tracks.clone()).unwrap();
    coordinator.toggle_play_pause();
    assert_eq!(coordinator.snapshot().current_index(), 1);

    assert!(coordinator.reconnect());
    wait_until(&coordinator, |s| s.connection == ConnectionStatus::Connected).await;
    assert!(!coordinator.reconnect());
    assert_eq!(backend.attempts(), 2);
    assert!(coordinator.connection_failure().is_none());

    settle().await;
    assert_eq!(backend.latest_player().unwrap().current_index(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn session_loss_keeps_state_and_drops_commands() {
    let backend = LoopbackBackend::new(ITEM);
    let effects = LoopbackEffects::new();
    let (coordinator, player) = connected(&backend, Some(&effects)).await;
    let tracks = create_tracks(3);
    playing_from(&coordinator, &tracks, 1).await;
    assert_eq!(effects.live_sessions().len(), 1);

    player.lose_session();
    wait_until(&coordinator, |s| s.connection == ConnectionStatus::Disconnected).await;

    assert_eq!(coordinator.snapshot().current_index(), 1);
    assert!(effects.live_sessions().is_empty());

    player.clear_commands();
    coordinator.next();
    coordinator.seek_to(1_000);
    assert!(player.commands().is_empty());
}

/// Backend that binds on demand and whose first `set_volume` blocks until released
struct GatedBackend {
    handle: Arc<GatedHandle>,
    bind: Mutex<Option<oneshot::Receiver<()>>>,
}

#[async_trait]
impl PlaybackBackend for GatedBackend {
    async fn connect(&self) -> Result<BackendSession, ConnectError> {
        let bind = self.bind.lock().unwrap().take();
        if let Some(bind) = bind {
            let _ = bind.await;
        }
        let (tx, events) = mpsc::unbounded_channel();
        self.handle.events.lock().unwrap().push(tx);
        Ok(BackendSession {
            handle: Arc::clone(&self.handle) as Arc<dyn BackendHandle>,
            events,
        })
    }
}

struct GatedHandle {
    items: Mutex<Vec<SourceLocator>>,
    playing: AtomicBool,
    entered: mpsc::UnboundedSender<()>,
    gate: Mutex<Option<std_mpsc::Receiver<()>>>,
    events: Mutex<Vec<mpsc::UnboundedSender<BackendEvent>>>,
}

impl GatedHandle {
    fn new(entered: mpsc::UnboundedSender<()>, gate: std_mpsc::Receiver<()>) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            entered,
            gate: Mutex::new(Some(gate)),
            events: Mutex::new(Vec::new()),
        }
    }

    fn items(&self) -> Vec<SourceLocator> {
        self.items.lock().unwrap().clone()
    }
}

impl BackendHandle for GatedHandle {
    fn stop(&self) -> Result<(), BackendError> {
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), BackendError> {
        self.items.lock().unwrap().clear();
        Ok(())
    }

    fn enqueue(&self, source: &SourceLocator) -> Result<(), BackendError> {
        self.items.lock().unwrap().push(source.clone());
        Ok(())
    }

    fn prepare(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn seek_to_item(&self, _index: usize, _position_ms: u64) -> Result<(), BackendError> {
        Ok(())
    }

    fn seek(&self, _position_ms: u64) -> Result<(), BackendError> {
        Ok(())
    }

    fn play(&self) -> Result<(), BackendError> {
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) -> Result<(), BackendError> {
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn skip_next(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn skip_previous(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_volume(&self, _level: f32) -> Result<(), BackendError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = self.entered.send(());
            let _ = gate.recv();
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn position_ms(&self) -> u64 {
        0
    }

    fn duration_ms(&self) -> Option<u64> {
        None
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn play_during_restore_is_applied_after_it() {
    let (bind_tx, bind_rx) = oneshot::channel();
    let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
    let (gate_tx, gate_rx) = std_mpsc::channel();
    let handle = Arc::new(GatedHandle::new(entered_tx, gate_rx));
    let backend = GatedBackend {
        handle: Arc::clone(&handle),
        bind: Mutex::new(Some(bind_rx)),
    };
    let coordinator = Arc::new(PlaybackCoordinator::start(
        Arc::new(backend),
        PlaybackConfig::default(),
    ));

    let first = create_tracks(3);
    coordinator.play_track(&first[0], first.clone()).unwrap();

    // Bind, then hold the restore inside its first backend call
    bind_tx.send(()).unwrap();
    entered_rx.recv().await.unwrap();

    let second: Vec<Arc<Track>> = (100..=101)
        .map(|id| {
            Arc::new(Track::new(
                TrackId::new(id).unwrap(),
                format!("Track {id}"),
                locator(id),
            ))
        })
        .collect();
    let command = {
        let coordinator = Arc::clone(&coordinator);
        let second = second.clone();
        tokio::task::spawn_blocking(move || coordinator.play_track(&second[0], second.clone()))
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    gate_tx.send(()).unwrap();
    command.await.unwrap().unwrap();

    let visible: Vec<SourceLocator> = coordinator
        .snapshot()
        .queue
        .tracks()
        .iter()
        .map(|t| t.source.clone())
        .collect();
    assert_eq!(visible, vec![locator(100), locator(101)]);
    assert_eq!(handle.items(), visible);
    assert!(handle.is_playing());
}

// ===== Transport Commands =====

#[tokio::test(start_paused = true)]
async fn toggle_follows_backend_state() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(2);
    playing_from(&coordinator, &tracks, 0).await;
    player.clear_commands();

    coordinator.toggle_play_pause();
    assert_eq!(player.commands(), vec![BackendCommand::Pause]);
    wait_until(&coordinator, |s| !s.is_playing).await;

    coordinator.toggle_play_pause();
    assert_eq!(
        player.commands(),
        vec![BackendCommand::Pause, BackendCommand::Play]
    );
    wait_until(&coordinator, |s| s.is_playing).await;
}

#[tokio::test(start_paused = true)]
async fn previous_restarts_late_in_track() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(3);
    playing_from(&coordinator, &tracks, 2).await;

    tokio::time::sleep(Duration::from_millis(6_000)).await;
    player.clear_commands();
    coordinator.previous();

    assert_eq!(player.commands(), vec![BackendCommand::Seek(0)]);
    settle().await;
    assert_eq!(coordinator.snapshot().current_index(), 2);
}

#[tokio::test(start_paused = true)]
async fn previous_moves_back_early_in_track() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(3);
    playing_from(&coordinator, &tracks, 2).await;

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    player.clear_commands();
    coordinator.previous();

    assert_eq!(player.commands(), vec![BackendCommand::SkipPrevious]);
    wait_until(&coordinator, |s| s.current_index() == 1).await;
    assert_eq!(coordinator.snapshot().current_track().unwrap().id.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn previous_on_first_track_stays() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, _player) = connected(&backend, None).await;
    let tracks = create_tracks(3);
    playing_from(&coordinator, &tracks, 0).await;

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    coordinator.previous();
    settle().await;

    assert_eq!(coordinator.snapshot().current_index(), 0);
}

#[tokio::test(start_paused = true)]
async fn next_at_end_does_not_wrap() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(2);
    playing_from(&coordinator, &tracks, 1).await;

    coordinator.next();
    settle().await;

    assert_eq!(coordinator.snapshot().current_index(), 1);
    assert_eq!(player.current_index(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn seek_is_forwarded_unclamped() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;

    coordinator.seek_to(999_999);

    assert_eq!(player.commands(), vec![BackendCommand::Seek(999_999)]);
}

#[tokio::test(start_paused = true)]
async fn skip_to_index_out_of_range_is_ignored() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(3);
    playing_from(&coordinator, &tracks, 1).await;
    player.clear_commands();
    let before = coordinator.snapshot();

    coordinator.skip_to_index(3);
    coordinator.skip_to_index(usize::MAX);
    settle().await;

    assert!(player.commands().is_empty());
    assert_eq!(coordinator.snapshot().current_index(), before.current_index());
    assert_eq!(coordinator.snapshot().queue, before.queue);
}

#[tokio::test(start_paused = true)]
async fn skip_to_index_resumes_when_paused() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(3);
    playing_from(&coordinator, &tracks, 0).await;
    coordinator.toggle_play_pause();
    wait_until(&coordinator, |s| !s.is_playing).await;
    player.clear_commands();

    coordinator.skip_to_index(2);

    assert_eq!(
        player.commands(),
        vec![
            BackendCommand::SeekToItem {
                index: 2,
                position_ms: 0
            },
            BackendCommand::Play,
        ]
    );
    wait_until(&coordinator, |s| s.is_playing && s.current_index() == 2).await;
}

#[tokio::test(start_paused = true)]
async fn volume_is_clamped_published_and_forwarded() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;

    coordinator.set_volume(-0.3);
    assert_eq!(coordinator.snapshot().volume, 0.0);
    coordinator.set_volume(1.7);
    assert_eq!(coordinator.snapshot().volume, 1.0);
    coordinator.set_volume(0.42);
    assert_eq!(coordinator.snapshot().volume, 0.42);
    coordinator.set_volume(f32::NAN);
    assert_eq!(coordinator.snapshot().volume, 0.42);

    assert_eq!(
        player.commands(),
        vec![
            BackendCommand::SetVolume(0.0),
            BackendCommand::SetVolume(1.0),
            BackendCommand::SetVolume(0.42),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn volume_is_published_while_disconnected() {
    let backend = LoopbackBackend::new(ITEM).with_connect_delay(Duration::from_secs(1));
    let coordinator = PlaybackCoordinator::start(Arc::new(backend), PlaybackConfig::default());

    coordinator.set_volume(1.7);

    assert_eq!(coordinator.snapshot().volume, 1.0);
    assert_eq!(coordinator.connection_status(), ConnectionStatus::Connecting);
}

// ===== Backend Events =====

#[tokio::test(start_paused = true)]
async fn out_of_range_transition_is_ignored() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, player) = connected(&backend, None).await;
    let tracks = create_tracks(3);
    playing_from(&coordinator, &tracks, 1).await;

    player.inject(BackendEvent::MediaItemTransition { index: 7 });
    settle().await;
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.current_index(), 1);
    assert_eq!(snapshot.current_track().unwrap().id.get(), 2);

    player.inject(BackendEvent::MediaItemTransition { index: 0 });
    wait_until(&coordinator, |s| s.current_index() == 0).await;
    assert_eq!(coordinator.snapshot().current_track().unwrap().id.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn auto_advance_moves_current_track() {
    let backend = LoopbackBackend::new(Duration::from_secs(1));
    let (coordinator, _player) = connected(&backend, None).await;
    let tracks = create_tracks(2);
    playing_from(&coordinator, &tracks, 0).await;

    wait_until(&coordinator, |s| s.current_index() == 1).await;
    assert_eq!(coordinator.snapshot().current_track().unwrap().id.get(), 2);

    // End of queue: playback stops, queue stays for the mini-player
    wait_until(&coordinator, |s| !s.is_playing).await;
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.queue.len(), 2);
    assert_eq!(snapshot.current_index(), 1);
}

#[tokio::test(start_paused = true)]
async fn loudness_effect_follows_audio_session() {
    let backend = LoopbackBackend::new(ITEM);
    let effects = LoopbackEffects::new();
    let (coordinator, player) = connected(&backend, Some(&effects)).await;
    let tracks = create_tracks(2);
    playing_from(&coordinator, &tracks, 0).await;

    let first = player.session();
    assert_eq!(effects.live_sessions(), vec![first]);

    // Same identity again: nothing rebuilt
    player.inject(BackendEvent::AudioSessionChanged(first));
    settle().await;
    assert_eq!(effects.created(), 1);

    // New identity: exactly one torn down, one built
    let second = player.reroute();
    settle().await;
    assert_eq!(effects.created(), 2);
    assert_eq!(effects.released(), 1);
    assert_eq!(effects.live_sessions(), vec![second]);

    // Session torn down without replacement
    player.inject(BackendEvent::AudioSessionChanged(AudioSessionId::NONE));
    settle().await;
    assert!(effects.live_sessions().is_empty());

    drop(coordinator);
}

#[tokio::test(start_paused = true)]
async fn effect_failure_is_contained() {
    let backend = LoopbackBackend::new(ITEM);
    let effects = LoopbackEffects::new();
    effects.set_fail_create(true);
    let (coordinator, _player) = connected(&backend, Some(&effects)).await;
    let tracks = create_tracks(2);

    playing_from(&coordinator, &tracks, 0).await;

    assert_eq!(effects.created(), 0);
    assert_eq!(coordinator.connection_status(), ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_coordinator_releases_the_effect() {
    let backend = LoopbackBackend::new(ITEM);
    let effects = LoopbackEffects::new();
    let (coordinator, _player) = connected(&backend, Some(&effects)).await;
    let tracks = create_tracks(2);
    playing_from(&coordinator, &tracks, 0).await;
    assert_eq!(effects.live_sessions().len(), 1);

    drop(coordinator);
    settle().await;

    assert!(effects.live_sessions().is_empty());
    assert_eq!(effects.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_discards_a_pending_bind() {
    let backend = LoopbackBackend::new(ITEM).with_connect_delay(Duration::from_millis(50));
    let effects = LoopbackEffects::new();
    let coordinator = PlaybackCoordinator::builder(Arc::new(backend.clone()))
        .effects(Arc::new(effects.clone()))
        .start();
    let tracks = create_tracks(2);
    coordinator.play_track(&tracks[0], tracks.clone()).unwrap();

    coordinator.shutdown();
    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;

    assert_eq!(coordinator.connection_status(), ConnectionStatus::Disconnected);
    assert_eq!(coordinator.snapshot().connection, ConnectionStatus::Disconnected);
    if let Some(player) = backend.latest_player() {
        assert!(player.commands().is_empty());
    }
    assert_eq!(effects.created(), 0);
}

// ===== Position Sampler =====

#[tokio::test(start_paused = true)]
async fn sampler_publishes_position_while_playing() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, _player) = connected(&backend, None).await;
    let tracks = create_tracks(2);
    playing_from(&coordinator, &tracks, 0).await;

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let snapshot = coordinator.snapshot();
    assert!(snapshot.position_ms > 900 && snapshot.position_ms <= 1_000);
    assert_eq!(snapshot.duration_ms, ITEM.as_millis() as u64);

    coordinator.toggle_play_pause();
    wait_until(&coordinator, |s| !s.is_playing).await;
    let paused_at = coordinator.snapshot().position_ms;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(coordinator.snapshot().position_ms, paused_at);
}

#[tokio::test(start_paused = true)]
async fn sampler_is_idle_without_backend() {
    let backend = LoopbackBackend::new(ITEM).with_connect_plan([ConnectStep::Fail {
        after: Duration::ZERO,
        reason: "offline".into(),
    }]);
    let coordinator = PlaybackCoordinator::start(Arc::new(backend), PlaybackConfig::default());
    let tracks = create_tracks(2);
    coordinator.play_track(&tracks[0], tracks.clone()).unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.position_ms, 0);
    assert_eq!(snapshot.connection, ConnectionStatus::Failed);
}

// ===== Lyrics =====

#[tokio::test(start_paused = true)]
async fn missing_lyrics_are_fetched_and_followed() {
    let backend = LoopbackBackend::new(ITEM);
    let lyrics = Arc::new(ScriptedLyrics::new(
        Duration::from_millis(20),
        &[(1, "[00:01.00]first\n[00:03.00]second")],
    ));
    let coordinator = PlaybackCoordinator::builder(Arc::new(backend))
        .lyrics(lyrics.clone())
        .start();
    wait_until(&coordinator, |s| s.connection == ConnectionStatus::Connected).await;
    let tracks = create_tracks(2);

    playing_from(&coordinator, &tracks, 0).await;
    wait_until(&coordinator, |s| {
        s.current_track().is_some_and(|t| t.has_lyrics())
    })
    .await;

    assert_eq!(lyrics.calls.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.lyrics().len(), 2);
    assert_eq!(coordinator.active_lyric_line().unwrap().text, "first");

    tokio::time::sleep(Duration::from_millis(3_000)).await;
    assert_eq!(coordinator.active_lyric_line().unwrap().text, "second");
}

#[tokio::test(start_paused = true)]
async fn late_lyrics_for_previous_track_are_dropped() {
    let backend = LoopbackBackend::new(ITEM);
    let lyrics = Arc::new(ScriptedLyrics::new(
        Duration::from_millis(100),
        &[(1, "[00:01.00]one"), (2, "[00:01.00]two")],
    ));
    let coordinator = PlaybackCoordinator::builder(Arc::new(backend))
        .lyrics(lyrics.clone())
        .start();
    wait_until(&coordinator, |s| s.connection == ConnectionStatus::Connected).await;
    let tracks = create_tracks(2);

    coordinator.play_track(&tracks[0], tracks.clone()).unwrap();
    settle().await;
    coordinator.play_track(&tracks[1], tracks.clone()).unwrap();
    settle().await;

    tokio::time::sleep(Duration::from_millis(200)).await;

    let snapshot = coordinator.snapshot();
    assert_eq!(lyrics.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        snapshot.current_track().unwrap().lyrics.as_deref(),
        Some("[00:01.00]two")
    );
    assert!(snapshot.queue.get(0).unwrap().lyrics.is_none());
}

#[tokio::test(start_paused = true)]
async fn embedded_lyrics_are_not_fetched() {
    let backend = LoopbackBackend::new(ITEM);
    let lyrics = Arc::new(ScriptedLyrics::new(Duration::ZERO, &[]));
    let coordinator = PlaybackCoordinator::builder(Arc::new(backend))
        .lyrics(lyrics.clone())
        .start();
    let track = Arc::new(create_tracks(1)[0].with_lyrics("[00:00.50]embedded"));

    coordinator.play_track(&track, vec![Arc::clone(&track)]).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(lyrics.calls.load(Ordering::SeqCst), 0);
    assert_eq!(coordinator.lyrics()[0].text, "embedded");
}

#[tokio::test(start_paused = true)]
async fn attach_lyrics_rejects_stale_track() {
    let backend = LoopbackBackend::new(ITEM);
    let (coordinator, _player) = connected(&backend, None).await;
    let tracks = create_tracks(2);
    coordinator.play_track(&tracks[1], tracks.clone()).unwrap();

    let stale = coordinator.attach_lyrics(tracks[0].id, "[00:01]nope");
    assert!(matches!(stale, Err(PlaybackError::TrackMismatch { .. })));

    coordinator.attach_lyrics(tracks[1].id, "[00:01]yes").unwrap();
    assert_eq!(coordinator.lyrics()[0].text, "yes");
}

// ===== Playlists =====

#[tokio::test(start_paused = true)]
async fn playlists_follow_the_feed() {
    let feed = Arc::new(StaticPlaylists::new(Vec::new()));
    let coordinator = PlaybackCoordinator::builder(Arc::new(LoopbackBackend::new(ITEM)))
        .playlists(feed.clone())
        .start();
    assert!(coordinator.playlists().is_empty());

    let mut playlist = Playlist::new(PlaylistId::new(4), "Favourites");
    playlist.tracks = create_tracks(2).iter().map(|t| (**t).clone()).collect();
    feed.publish(vec![playlist]);

    let playlists = coordinator.playlists();
    assert_eq!(playlists.len(), 1);
    assert_eq!(playlists[0].name, "Favourites");
    assert_eq!(playlists[0].len(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_feed_means_no_playlists() {
    let coordinator = PlaybackCoordinator::start(
        Arc::new(LoopbackBackend::new(ITEM)),
        PlaybackConfig::default(),
    );
    assert!(coordinator.playlists().is_empty());
    assert!(coordinator.subscribe_playlists().is_none());
}
