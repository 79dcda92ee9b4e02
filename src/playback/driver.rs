//! Runs a [`PlaybackSession`] on its own task.
//!
//! User commands, resource events and the progress ticker are funnelled into
//! one loop, so the session never sees two transitions at once. The ticker
//! only exists while the session is playing.

use super::debounce::Debouncer;
use super::engine::{resource_channel, PlaybackEngine, ResourceEventReceiver};
use super::events::{PlaybackStatus, SessionEvent, SessionSnapshot};
use super::navigation::Direction;
use super::session::{PlaybackError, PlaybackSession};
use crate::config::PlaybackSettings;
use crate::library::{CategoryFilter, Track, TrackListProvider, TrackResolver};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const COMMAND_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Play {
        track: Track,
        category: Option<CategoryFilter>,
    },
    Toggle(Track),
    Next,
    Previous,
    Seek(f64),
    Skip {
        forward: bool,
        seconds: Option<f64>,
    },
    Stop,
    SetCategory(CategoryFilter),
    Shutdown,
}

impl SessionCommand {
    /// Transitions a double click could fire twice.
    fn is_debounced(&self) -> bool {
        matches!(
            self,
            SessionCommand::Play { .. }
                | SessionCommand::Toggle(_)
                | SessionCommand::Next
                | SessionCommand::Previous
                | SessionCommand::Skip { .. }
        )
    }
}

/// Cheap, cloneable front door to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub async fn play(&self, track: Track, category: Option<CategoryFilter>) -> Result<(), PlaybackError> {
        self.send(SessionCommand::Play { track, category }).await
    }

    /// Play/pause `track` if it is current, otherwise start it.
    pub async fn toggle(&self, track: Track) -> Result<(), PlaybackError> {
        self.send(SessionCommand::Toggle(track)).await
    }

    pub async fn next(&self) -> Result<(), PlaybackError> {
        self.send(SessionCommand::Next).await
    }

    pub async fn previous(&self) -> Result<(), PlaybackError> {
        self.send(SessionCommand::Previous).await
    }

    pub async fn seek(&self, percent: f64) -> Result<(), PlaybackError> {
        self.send(SessionCommand::Seek(percent)).await
    }

    pub async fn skip_forward(&self, seconds: Option<f64>) -> Result<(), PlaybackError> {
        self.send(SessionCommand::Skip { forward: true, seconds }).await
    }

    pub async fn skip_backward(&self, seconds: Option<f64>) -> Result<(), PlaybackError> {
        self.send(SessionCommand::Skip { forward: false, seconds }).await
    }

    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.send(SessionCommand::Stop).await
    }

    pub async fn set_category(&self, category: CategoryFilter) -> Result<(), PlaybackError> {
        self.send(SessionCommand::SetCategory(category)).await
    }

    /// Stop playback and end the session task.
    pub async fn shutdown(&self) -> Result<(), PlaybackError> {
        self.send(SessionCommand::Shutdown).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: SessionCommand) -> Result<(), PlaybackError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlaybackError::SessionClosed)
    }
}

/// Build a session around `engine` and run it on a new task.
pub fn spawn_session(
    engine: Box<dyn PlaybackEngine>,
    resolver: Arc<dyn TrackResolver>,
    tracks: Arc<dyn TrackListProvider>,
    settings: PlaybackSettings,
) -> (SessionHandle, JoinHandle<()>) {
    let (resource_tx, resource_rx) = resource_channel();
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);

    let session = PlaybackSession::new(engine, resolver, resource_tx, settings.clone());
    let handle = SessionHandle {
        commands: command_tx,
        state: session.watch(),
        events: session.event_sender(),
    };

    let driver = SessionDriver {
        session,
        commands: command_rx,
        resources: resource_rx,
        tracks,
        last_list: Vec::new(),
        debouncer: Debouncer::new(settings.debounce_window()),
        ticker: None,
        tick_period: settings.progress_interval(),
        skip_step: settings.skip_step(),
    };

    (handle, tokio::spawn(driver.run()))
}

struct SessionDriver {
    session: PlaybackSession,
    commands: mpsc::Receiver<SessionCommand>,
    resources: ResourceEventReceiver,
    tracks: Arc<dyn TrackListProvider>,
    last_list: Vec<Track>,
    debouncer: Debouncer,
    ticker: Option<Interval>,
    tick_period: Duration,
    skip_step: f64,
}

impl SessionDriver {
    async fn run(mut self) {
        info!("Playback session started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command).await,
                },
                Some(event) = self.resources.recv() => {
                    self.session.handle_resource_event(event);
                }
                _ = next_tick(&mut self.ticker) => {
                    self.session.on_progress_tick();
                }
            }
            self.sync_ticker();
        }

        self.session.stop().await;
        info!("Playback session stopped");
    }

    async fn handle(&mut self, command: SessionCommand) {
        if command.is_debounced() && !self.debouncer.try_acquire() {
            debug!("Dropping {:?} inside debounce window", command);
            return;
        }

        match command {
            SessionCommand::Play { track, category } => self.session.play(track, category).await,
            SessionCommand::Toggle(track) => self.session.toggle_play_pause(track).await,
            SessionCommand::Next => self.navigate(Direction::Next).await,
            SessionCommand::Previous => self.navigate(Direction::Previous).await,
            SessionCommand::Seek(percent) => {
                let outcome = self.session.seek(percent);
                debug!("Seek to {:.1}%: {:?}", percent, outcome);
            }
            SessionCommand::Skip { forward, seconds } => {
                let seconds = seconds.unwrap_or(self.skip_step);
                let outcome = if forward {
                    self.session.skip_forward(seconds)
                } else {
                    self.session.skip_backward(seconds)
                };
                debug!("Skip {}{}s: {:?}", if forward { "+" } else { "-" }, seconds, outcome);
            }
            SessionCommand::Stop => self.session.stop().await,
            SessionCommand::SetCategory(category) => self.session.set_category(category),
            SessionCommand::Shutdown => {}
        }
    }

    async fn navigate(&mut self, direction: Direction) {
        let list = self.current_list().await;
        let outcome = self.session.play_adjacent(direction, &list).await;
        debug!("{:?}: {:?}", direction, outcome);
    }

    // Fresh list from the provider; the last good one if it fails
    async fn current_list(&mut self) -> Vec<Track> {
        match self.tracks.track_list().await {
            Ok(list) => {
                self.last_list = list.clone();
                list
            }
            Err(e) => {
                warn!(
                    "Track list unavailable, reusing last known ({} tracks): {}",
                    self.last_list.len(),
                    e
                );
                self.last_list.clone()
            }
        }
    }

    fn sync_ticker(&mut self) {
        let playing = self.session.status() == PlaybackStatus::Playing;
        match (playing, self.ticker.is_some()) {
            (true, false) => {
                let mut ticker =
                    tokio::time::interval_at(Instant::now() + self.tick_period, self.tick_period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.ticker = Some(ticker);
            }
            (false, true) => self.ticker = None,
            _ => {}
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ResolveError, StaticCatalog};
    use crate::playback::testing::FakeEngine;
    use futures::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicBool, Ordering};

    const SONG: Duration = Duration::from_secs(200);

    fn catalog() -> Arc<StaticCatalog> {
        Arc::new(StaticCatalog::new(vec![
            Track::from_id("1").with_title("A").with_source("https://cdn/1.mp3").with_display_index(0),
            Track::from_id("2").with_title("B").with_source("https://cdn/2.mp3").with_display_index(1),
            Track::from_id("3").with_title("C").with_source("https://cdn/3.mp3").with_display_index(2),
        ]))
    }

    fn settings() -> PlaybackSettings {
        PlaybackSettings {
            release_grace_ms: 0,
            ..PlaybackSettings::default()
        }
    }

    fn spawn(engine: &FakeEngine, tracks: Arc<dyn TrackListProvider>) -> (SessionHandle, JoinHandle<()>) {
        spawn_session(Box::new(engine.clone()), catalog(), tracks, settings())
    }

    async fn wait_for(handle: &SessionHandle, f: impl FnMut(&SessionSnapshot) -> bool) -> SessionSnapshot {
        let mut watch = handle.watch();
        let snapshot = watch.wait_for(f).await.unwrap().clone();
        snapshot
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(400)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_reaches_playing() {
        let engine = FakeEngine::new().auto_ready(Some(SONG));
        let (handle, _task) = spawn(&engine, catalog());

        handle.play(Track::from_id("2"), None).await.unwrap();
        let snapshot = wait_for(&handle, |s| s.status == PlaybackStatus::Playing).await;

        assert_eq!(snapshot.track_id().map(|id| id.as_str()), Some("2"));
        assert_eq!(snapshot.progress.total_seconds, 200.0);
        assert_eq!(engine.live_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_toggle_inside_window_is_one_transition() {
        let engine = FakeEngine::new().auto_ready(Some(SONG));
        let (handle, _task) = spawn(&engine, catalog());

        handle.play(Track::from_id("1"), None).await.unwrap();
        wait_for(&handle, |s| s.status == PlaybackStatus::Playing).await;
        settle().await;

        handle.toggle(Track::from_id("1")).await.unwrap();
        handle.toggle(Track::from_id("1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(handle.snapshot().status, PlaybackStatus::Paused);
        assert_eq!(engine.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_seek_are_not_debounced() {
        let engine = FakeEngine::new().auto_ready(Some(SONG));
        let (handle, _task) = spawn(&engine, catalog());

        handle.play(Track::from_id("1"), None).await.unwrap();
        wait_for(&handle, |s| s.status == PlaybackStatus::Playing).await;

        handle.seek(50.0).await.unwrap();
        let snapshot = wait_for(&handle, |s| s.progress.elapsed_seconds == 100.0).await;
        assert_eq!(snapshot.status, PlaybackStatus::Playing);

        handle.stop().await.unwrap();
        wait_for(&handle, |s| s.status == PlaybackStatus::Idle).await;
        assert_eq!(engine.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_ticks_while_playing() {
        let engine = FakeEngine::new().auto_ready(Some(SONG));
        let (handle, _task) = spawn(&engine, catalog());

        handle.play(Track::from_id("1"), None).await.unwrap();
        wait_for(&handle, |s| s.status == PlaybackStatus::Playing).await;

        engine.set_position(0, Duration::from_secs(42));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(handle.snapshot().progress.elapsed_seconds, 42.0);

        // paused: ticker is gone, elapsed stays put
        settle().await;
        handle.toggle(Track::from_id("1")).await.unwrap();
        wait_for(&handle, |s| s.status == PlaybackStatus::Paused).await;
        engine.set_position(0, Duration::from_secs(90));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.snapshot().progress.elapsed_seconds, 42.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_uses_provider_list() {
        let engine = FakeEngine::new().auto_ready(Some(SONG));
        let (handle, _task) = spawn(&engine, catalog());

        handle.play(Track::from_id("3"), Some(CategoryFilter::All)).await.unwrap();
        wait_for(&handle, |s| s.status == PlaybackStatus::Playing).await;
        settle().await;

        handle.next().await.unwrap();
        let snapshot = wait_for(&handle, |s| {
            s.status == PlaybackStatus::Playing && s.track_id().map(|id| id.as_str()) == Some("1")
        })
        .await;
        assert_eq!(snapshot.category, CategoryFilter::All);
        assert_eq!(engine.live_count(), 1);
    }

    struct FlakyList {
        inner: Arc<StaticCatalog>,
        broken: AtomicBool,
    }

    impl TrackListProvider for FlakyList {
        fn track_list(&self) -> BoxFuture<'_, Result<Vec<Track>, ResolveError>> {
            async move {
                if self.broken.load(Ordering::SeqCst) {
                    Err(ResolveError::Network("timeout".into()))
                } else {
                    self.inner.track_list().await
                }
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_reuses_last_list() {
        let engine = FakeEngine::new().auto_ready(Some(SONG));
        let flaky = Arc::new(FlakyList {
            inner: catalog(),
            broken: AtomicBool::new(false),
        });
        let (handle, _task) = spawn(&engine, flaky.clone());

        handle.play(Track::from_id("1"), None).await.unwrap();
        wait_for(&handle, |s| s.status == PlaybackStatus::Playing).await;
        settle().await;
        handle.next().await.unwrap();
        wait_for(&handle, |s| s.track_id().map(|id| id.as_str()) == Some("2")).await;

        flaky.broken.store(true, Ordering::SeqCst);
        settle().await;
        handle.next().await.unwrap();
        wait_for(&handle, |s| s.track_id().map(|id| id.as_str()) == Some("3")).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_resource() {
        let engine = FakeEngine::new().auto_ready(Some(SONG));
        let (handle, task) = spawn(&engine, catalog());

        handle.play(Track::from_id("1"), None).await.unwrap();
        wait_for(&handle, |s| s.status == PlaybackStatus::Playing).await;

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(engine.live_count(), 0);
        assert!(matches!(handle.stop().await, Err(PlaybackError::SessionClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_reach_subscribers() {
        let engine = FakeEngine::new().auto_ready(Some(SONG));
        let (handle, _task) = spawn(&engine, catalog());
        let mut events = handle.subscribe();

        handle.play(Track::from_id("1"), None).await.unwrap();
        loop {
            if let SessionEvent::TrackStarted { track, .. } = events.recv().await.unwrap() {
                assert_eq!(track.title.as_deref(), Some("A"));
                break;
            }
        }
    }
}
