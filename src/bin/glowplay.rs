use anyhow::{Context, Result};
use clap::Parser;
use glowplay::{
    audio::RodioEngine,
    cli::{parse_command, Command, CommandError, HELP},
    config::{Config, LoggingConfig},
    library::{
        external::load_external_list, search::TrackSearch, StaticCatalog, Track, TrackId, TrackListProvider,
        TrackResolver,
    },
    playback::{spawn_session, SessionEvent, SessionHandle},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "glowplay")]
#[command(about = "Play tracks from a music library and an external upload list")]
struct Args {
    /// Config file (defaults to <config dir>/glowplay/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,

    /// Skip the REST API and play the external list only
    #[arg(long)]
    offline: bool,
}

fn init_logging(config: &LoggingConfig, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("Failed to create log directory {}", config.directory.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&config.directory, "glowplay.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    // Dev mode mirrors everything to stderr
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr).with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    if dev {
        eprintln!("🔧 Dev mode: debug output enabled to stderr + file");
    }
    Ok(guard)
}

type Sources = (Arc<dyn TrackResolver>, Arc<dyn TrackListProvider>);

fn offline_sources(external: Vec<Track>) -> Sources {
    info!("Offline: {} external tracks", external.len());
    let catalog = Arc::new(StaticCatalog::new(external));
    (catalog.clone(), catalog)
}

/// Resolver for ids and the provider for next/previous, library first.
#[cfg(feature = "remote")]
fn build_sources(config: &Config, external: Vec<Track>) -> Result<Sources> {
    use glowplay::library::{remote::ApiClient, MergedCatalog};

    if config.library.offline {
        return Ok(offline_sources(external));
    }
    let api = Arc::new(ApiClient::new(&config.api)?);
    info!("Library API at {}", config.api.base_url);
    Ok((api.clone(), Arc::new(MergedCatalog::new(api, external))))
}

#[cfg(not(feature = "remote"))]
fn build_sources(_config: &Config, external: Vec<Track>) -> Result<Sources> {
    Ok(offline_sources(external))
}

struct Console {
    handle: SessionHandle,
    list: Arc<dyn TrackListProvider>,
    tracks: Vec<Track>,
    search: TrackSearch,
}

impl Console {
    async fn refresh(&mut self) -> &[Track] {
        match self.list.track_list().await {
            Ok(tracks) => self.tracks = tracks,
            Err(e) => {
                warn!("Track list refresh failed: {}", e);
                println!("⚠️  Could not load the track list: {}", e);
            }
        }
        &self.tracks
    }

    // Known tracks carry their source and title; unknown ids get resolved
    fn lookup(&self, id: &TrackId) -> Track {
        self.tracks
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .unwrap_or_else(|| Track::from_id(id.clone()))
    }

    /// Returns false once the user asked to quit.
    async fn dispatch(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Play(id) => {
                if self.tracks.is_empty() {
                    self.refresh().await;
                }
                let track = self.lookup(&id);
                self.handle.play(track, None).await?;
            }
            Command::Toggle(id) => {
                let track = match id {
                    Some(id) => {
                        if self.tracks.is_empty() {
                            self.refresh().await;
                        }
                        Some(self.lookup(&id))
                    }
                    None => self.handle.snapshot().track,
                };
                match track {
                    Some(track) => self.handle.toggle(track).await?,
                    None => println!("Nothing is playing"),
                }
            }
            Command::Next => self.handle.next().await?,
            Command::Previous => self.handle.previous().await?,
            Command::Seek(percent) => self.handle.seek(percent).await?,
            Command::Forward(seconds) => self.handle.skip_forward(seconds).await?,
            Command::Rewind(seconds) => self.handle.skip_backward(seconds).await?,
            Command::Stop => self.handle.stop().await?,
            Command::Category(category) => self.handle.set_category(category).await?,
            Command::List => {
                let tracks = self.refresh().await;
                for (i, track) in tracks.iter().enumerate() {
                    println!("{:>3}. [{}] {}", i + 1, track.id, track.display_name());
                }
            }
            Command::Search(query) => {
                self.refresh().await;
                let hits = self.search.search(&self.tracks, &query);
                if hits.is_empty() {
                    println!("No matches for '{}'", query);
                }
                for track in hits {
                    println!("  [{}] {}", track.id, track.display_name());
                }
            }
            Command::Status => print_status(&self.handle),
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }
}

fn print_status(handle: &SessionHandle) {
    let snapshot = handle.snapshot();
    let track = snapshot
        .track
        .as_ref()
        .map(|t| t.display_name())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{} | {} | {} / {} | category: {}",
        snapshot.status,
        track,
        snapshot.progress.elapsed_label(),
        snapshot.progress.total_label(),
        snapshot.category
    );
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::TrackStarted { track, .. }) => println!("▶️  {}", track.display_name()),
            Ok(SessionEvent::TrackEnded { track_id, .. }) => println!("⏹️  Finished {}", track_id),
            Ok(SessionEvent::Failed { track_id, error, .. }) => match track_id {
                Some(id) => println!("❌ {}: {}", id, error),
                None => println!("❌ {}", error),
            },
            Ok(SessionEvent::Restarted { track_id }) => println!("🔁 Restarted {}", track_id),
            Ok(SessionEvent::CategoryChanged(category)) => println!("📂 Category: {}", category),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event printer lagged by {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if args.offline {
        config.library.offline = true;
    }

    let _guard = init_logging(&config.logging, args.dev)?;
    info!("🎵 glowplay starting up");

    let external = load_external_list(&config.library.external_list).unwrap_or_else(|e| {
        warn!("Ignoring external list: {:#}", e);
        Vec::new()
    });
    let (resolver, list) = build_sources(&config, external)?;

    let engine = RodioEngine::new(&config.audio).context("Failed to open audio output")?;
    let (handle, session_task) = spawn_session(Box::new(engine), resolver, list.clone(), config.playback.clone());
    tokio::spawn(print_events(handle.subscribe()));

    println!("🎵 glowplay - type 'help' for commands");
    let mut console = Console {
        handle: handle.clone(),
        list,
        tracks: Vec::new(),
        search: TrackSearch::new(),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(command) => {
                if !console.dispatch(command).await? {
                    break;
                }
            }
            Err(CommandError::Empty) => {}
            Err(e) => println!("{}", e),
        }
    }

    info!("Shutting down");
    handle.shutdown().await?;
    session_task.await?;
    Ok(())
}
