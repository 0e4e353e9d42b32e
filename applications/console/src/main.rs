/// NAS Console - drive the playback coordinator from a terminal
use clap::Parser;
use nas_console::{
    library::{library_playlist, load_tracks, SidecarLyrics},
    shell::render_status,
    Command, Console, ConsoleConfig, Outcome,
};
use nas_core::StaticPlaylists;
use nas_playback::{LoopbackBackend, LoopbackEffects, PlaybackCoordinator};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nas-console")]
#[command(about = "NAS Player playback console (loopback backend)", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "NAS_CONFIG")]
    config: Option<PathBuf>,

    /// Skip binding loudness effects to audio sessions
    #[arg(long)]
    no_effects: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (stderr, so stdout stays readable)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nas_console=info,nas_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = ConsoleConfig::load(cli.config.as_deref())?;
    config.validate()?;

    let tracks = load_tracks(&config.library)?;
    tracing::info!(tracks = tracks.len(), "Library loaded");

    let backend = LoopbackBackend::new(Duration::from_millis(config.loopback.track_duration_ms))
        .with_connect_delay(Duration::from_millis(config.loopback.connect_delay_ms));

    let mut builder = PlaybackCoordinator::builder(Arc::new(backend))
        .config(config.playback.clone())
        .playlists(Arc::new(StaticPlaylists::new(vec![library_playlist(
            &tracks,
        )])));
    if !cli.no_effects {
        builder = builder.effects(Arc::new(LoopbackEffects::new()));
    }
    if config.library.sidecar_lyrics {
        builder = builder.lyrics(Arc::new(SidecarLyrics));
    }

    let console = Console::new(builder.start(), tracks);
    let announcer = tokio::spawn(announce_tracks(console.coordinator().subscribe()));

    println!("nas-console ready, type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match console.execute(command) {
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Continue(output)) if !output.is_empty() => println!("{output}"),
            Ok(Outcome::Continue(_)) => {}
            Err(e) => eprintln!("{e}"),
        }
    }

    announcer.abort();
    tracing::info!("Shutting down");
    Ok(())
}

/// Print a status line whenever the track or play state changes
async fn announce_tracks(
    mut updates: tokio::sync::watch::Receiver<nas_playback::PlaybackSnapshot>,
) {
    let mut last = None;
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        let key = (
            snapshot.current_track().map(|t| t.id),
            snapshot.is_playing,
            snapshot.connection,
        );
        if last != Some(key) {
            last = Some(key);
            println!("{}", render_status(&snapshot));
        }
    }
}
