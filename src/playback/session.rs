//! The playback session: one live resource, its status, progress and the
//! category used for next/previous.
//!
//! Every transition goes through here. Creating a resource always releases
//! the previous one first, and every exit from a track (stop, end, error,
//! supersede) runs the same release path. Errors never leave this type; they
//! become a `Failed` event and an idle session.

use super::engine::{
    EngineError, PlaybackEngine, PlaybackResource, ResourceEvent, ResourceEventKind,
    ResourceEventSender, ResourceId, ResourceObserver,
};
use super::events::{PlaybackStatus, SessionEvent, SessionSnapshot};
use super::navigation::{infer_category, resolve_adjacent_track, Direction};
use super::progress::Progress;
use crate::config::PlaybackSettings;
use crate::library::source::resolve_track_source;
use crate::library::{CategoryFilter, ResolveError, Track, TrackId, TrackResolver};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Decode(#[from] EngineError),

    #[error("playback session has shut down")]
    SessionClosed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    /// Position moved to `seconds`.
    Applied { seconds: f64 },
    /// Duration not known yet; applied once it is.
    Deferred { percent: f64 },
    /// Duration unknown and the request cannot wait (relative skips).
    Unavailable,
    NoTrack,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    Advanced(TrackId),
    /// Nothing to move to; the current track started over.
    Restarted,
    NoTrack,
}

pub struct PlaybackSession {
    engine: Box<dyn PlaybackEngine>,
    resolver: Arc<dyn TrackResolver>,
    settings: PlaybackSettings,
    resource_tx: ResourceEventSender,
    next_resource: ResourceId,

    status: PlaybackStatus,
    current: Option<Track>,
    resource: Option<Box<dyn PlaybackResource>>,
    observer: Option<ResourceObserver>,
    progress: Progress,
    category: CategoryFilter,
    pending_seek: Option<f64>,

    events: broadcast::Sender<SessionEvent>,
    state: watch::Sender<SessionSnapshot>,
}

impl PlaybackSession {
    pub fn new(
        engine: Box<dyn PlaybackEngine>,
        resolver: Arc<dyn TrackResolver>,
        resource_tx: ResourceEventSender,
        settings: PlaybackSettings,
    ) -> Self {
        let category = settings.default_category;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(SessionSnapshot {
            category,
            ..SessionSnapshot::default()
        });

        Self {
            engine,
            resolver,
            settings,
            resource_tx,
            next_resource: 1,
            status: PlaybackStatus::Idle,
            current: None,
            resource: None,
            observer: None,
            progress: Progress::default(),
            category,
            pending_seek: None,
            events,
            state,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn category(&self) -> CategoryFilter {
        self.category
    }

    pub fn pending_seek(&self) -> Option<f64> {
        self.pending_seek
    }

    pub fn has_live_resource(&self) -> bool {
        self.resource.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            track: self.current_track().cloned(),
            progress: self.progress,
            category: self.category,
        }
    }

    /// Start `track`, replacing whatever is live. Category comes from
    /// `category` if given, else from the id, else stays as it is.
    pub async fn play(&mut self, mut track: Track, category: Option<CategoryFilter>) {
        info!("Play requested for {}", track.id);
        self.stop().await;

        let source = match resolve_track_source(self.resolver.as_ref(), &track).await {
            Ok(source) => source,
            Err(e) => {
                self.fail(Some(track.id), e.into());
                return;
            }
        };

        if track.title.is_none() {
            match self.resolver.resolve_metadata(&track.id).await {
                Ok(metadata) => track.merge_metadata(metadata),
                Err(e) => warn!("No metadata for {}: {}", track.id, e),
            }
        }

        let id = self.next_resource;
        self.next_resource += 1;
        let observer = ResourceObserver::new(id, self.resource_tx.clone());

        debug!("Opening resource {} for {} ({:?})", id, track.id, source);
        let resource = match self.engine.open(source, observer.clone()) {
            Ok(resource) => resource,
            Err(e) => {
                self.fail(Some(track.id), e.into());
                return;
            }
        };

        if let Some(category) = category.or_else(|| infer_category(track.id.as_str())) {
            self.set_category(category);
        }
        self.resource = Some(resource);
        self.observer = Some(observer);
        self.current = Some(track);
        self.progress = Progress::default();
        self.pending_seek = None;
        self.set_status(PlaybackStatus::Loading);
    }

    /// Flip play/pause when `track` is the live track, otherwise play it.
    pub async fn toggle_play_pause(&mut self, track: Track) {
        let is_current = self
            .current
            .as_ref()
            .map_or(false, |t| t.id == track.id);

        if !is_current || self.resource.is_none() {
            self.play(track, None).await;
            return;
        }

        match self.status {
            PlaybackStatus::Playing => {
                if let Some(resource) = self.resource.as_mut() {
                    resource.pause();
                }
                self.set_status(PlaybackStatus::Paused);
            }
            PlaybackStatus::Paused => {
                let resumed = match self.resource.as_mut() {
                    Some(resource) => resource.play(),
                    None => return,
                };
                match resumed {
                    Ok(()) => self.set_status(PlaybackStatus::Playing),
                    Err(e) => self.fail(Some(track.id), e.into()),
                }
            }
            status => debug!("Toggle for {} ignored while {}", track.id, status),
        }
    }

    /// Release everything and go idle. Safe to call repeatedly; waits out the
    /// release grace only when something was actually released.
    pub async fn stop(&mut self) {
        let released = self.release_resource();
        self.reset_idle();

        let grace = self.settings.release_grace();
        if released && grace > Duration::ZERO {
            tokio::time::sleep(grace).await;
        }
    }

    /// Logout and similar teardown. Same as `stop`.
    pub async fn reset(&mut self) {
        self.stop().await;
    }

    /// Seek to `percent` (clamped to 0-100) of the track.
    pub fn seek(&mut self, percent: f64) -> SeekOutcome {
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        if self.resource.is_none() {
            return SeekOutcome::NoTrack;
        }

        self.learn_duration();
        if !self.progress.duration_known() {
            debug!("Duration unknown, deferring seek to {:.1}%", percent);
            self.pending_seek = Some(percent);
            return SeekOutcome::Deferred { percent };
        }

        self.pending_seek = None;
        let target = percent / 100.0 * self.progress.total_seconds;
        self.seek_to(target)
    }

    pub fn skip_forward(&mut self, seconds: f64) -> SeekOutcome {
        self.skip_by(seconds.abs())
    }

    pub fn skip_backward(&mut self, seconds: f64) -> SeekOutcome {
        self.skip_by(-seconds.abs())
    }

    fn skip_by(&mut self, delta: f64) -> SeekOutcome {
        let position = match self.resource.as_ref() {
            Some(resource) => resource.position().as_secs_f64(),
            None => return SeekOutcome::NoTrack,
        };
        self.learn_duration();
        if !self.progress.duration_known() {
            return SeekOutcome::Unavailable;
        }
        self.seek_to(position + delta)
    }

    fn seek_to(&mut self, seconds: f64) -> SeekOutcome {
        let target = seconds.clamp(0.0, self.progress.total_seconds);
        if let Some(resource) = self.resource.as_mut() {
            if let Err(e) = resource.set_position(Duration::from_secs_f64(target)) {
                warn!("Seek to {:.1}s failed: {}", target, e);
            }
        }
        self.progress.set_elapsed(target);
        self.emit_progress();
        self.publish();
        SeekOutcome::Applied { seconds: target }
    }

    /// Move to the next/previous entry of `tracks` under the current category.
    /// An empty list restarts the current track in place.
    pub async fn play_adjacent(&mut self, direction: Direction, tracks: &[Track]) -> NavigationOutcome {
        let current_id = match self.current.as_ref() {
            Some(t) => t.id.clone(),
            None => return NavigationOutcome::NoTrack,
        };

        match resolve_adjacent_track(direction, tracks, current_id.as_str(), self.category) {
            Some(track) => {
                let track = track.clone();
                let id = track.id.clone();
                info!("{:?} from {} resolves to {}", direction, current_id, id);
                let category = self.category;
                self.play(track, Some(category)).await;
                NavigationOutcome::Advanced(id)
            }
            None => {
                self.restart_current();
                NavigationOutcome::Restarted
            }
        }
    }

    fn restart_current(&mut self) {
        let Some(track_id) = self.current.as_ref().map(|t| t.id.clone()) else {
            return;
        };
        info!("No track list, restarting {}", track_id);

        let mut resumed = Ok(());
        if let Some(resource) = self.resource.as_mut() {
            if let Err(e) = resource.set_position(Duration::ZERO) {
                warn!("Restart of {} failed: {}", track_id, e);
            }
            if self.status == PlaybackStatus::Paused {
                resumed = resource.play();
            }
        }

        self.progress.set_elapsed(0.0);
        self.emit(SessionEvent::Restarted {
            track_id: track_id.clone(),
        });
        match resumed {
            Ok(()) if self.status == PlaybackStatus::Paused => self.set_status(PlaybackStatus::Playing),
            Ok(()) => self.publish(),
            Err(e) => self.fail(Some(track_id), e.into()),
        }
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        if self.category != category {
            debug!("Category filter {} -> {}", self.category, category);
            self.category = category;
            self.emit(SessionEvent::CategoryChanged(category));
        }
        self.publish();
    }

    /// Entry point for everything the engine reports. Events from anything
    /// but the live resource are dropped.
    pub fn handle_resource_event(&mut self, event: ResourceEvent) {
        let live = self.resource.as_ref().map(|r| r.id());
        if live != Some(event.resource) {
            debug!("Dropping {:?} from stale resource {}", event.kind, event.resource);
            return;
        }

        match event.kind {
            ResourceEventKind::Ready { duration } => self.on_ready(duration),
            ResourceEventKind::DurationKnown(duration) => {
                self.progress.set_total(duration.as_secs_f64());
                self.apply_pending_seek();
                self.publish();
            }
            ResourceEventKind::Ended => self.on_ended(),
            ResourceEventKind::Failed(message) => {
                let track_id = self.current.as_ref().map(|t| t.id.clone());
                self.fail(track_id, EngineError::Decode(message).into());
            }
        }
    }

    /// Poll the live resource while playing.
    pub fn on_progress_tick(&mut self) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        let position = match self.resource.as_ref() {
            Some(resource) => resource.position(),
            None => return,
        };

        self.learn_duration();
        // An applied seek has already published its own position
        if self.apply_pending_seek() {
            return;
        }
        if self.pending_seek.is_none() {
            self.progress.set_elapsed(position.as_secs_f64());
        }
        self.emit_progress();
        self.publish();
    }

    fn on_ready(&mut self, duration: Option<Duration>) {
        if self.status != PlaybackStatus::Loading {
            debug!("Ready ignored while {}", self.status);
            return;
        }
        if let Some(duration) = duration {
            self.progress.set_total(duration.as_secs_f64());
        }
        self.apply_pending_seek();

        let started = match self.resource.as_mut() {
            Some(resource) => resource.play(),
            None => return,
        };
        let track = self.current_track().cloned();
        match started {
            Ok(()) => {
                self.set_status(PlaybackStatus::Playing);
                if let Some(track) = track {
                    info!("Now playing {}", track.display_name());
                    self.emit(SessionEvent::TrackStarted {
                        track,
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(e) => self.fail(track.map(|t| t.id), e.into()),
        }
    }

    fn on_ended(&mut self) {
        let track_id = self.current.as_ref().map(|t| t.id.clone());
        info!("Track finished: {:?}", track_id);
        self.release_resource();
        self.set_status(PlaybackStatus::Ended);
        if let Some(track_id) = track_id {
            self.emit(SessionEvent::TrackEnded {
                track_id,
                timestamp: Utc::now(),
            });
        }
        self.reset_idle();
    }

    fn fail(&mut self, track_id: Option<TrackId>, err: PlaybackError) {
        error!("Playback failed for {:?}: {}", track_id, err);
        self.release_resource();
        self.set_status(PlaybackStatus::Failed);
        self.emit(SessionEvent::Failed {
            track_id,
            error: err.to_string(),
            timestamp: Utc::now(),
        });
        self.reset_idle();
    }

    // Pick up a duration the resource knows but the progress doesn't yet
    fn learn_duration(&mut self) {
        if let Some(duration) = self.resource.as_ref().and_then(|r| r.duration()) {
            let seconds = duration.as_secs_f64();
            if seconds > 0.0 && seconds != self.progress.total_seconds {
                self.progress.set_total(seconds);
            }
        }
    }

    /// True when a deferred seek was applied.
    fn apply_pending_seek(&mut self) -> bool {
        if !self.progress.duration_known() {
            return false;
        }
        match self.pending_seek.take() {
            Some(percent) => {
                debug!("Applying deferred seek to {:.1}%", percent);
                let target = percent / 100.0 * self.progress.total_seconds;
                self.seek_to(target);
                true
            }
            None => false,
        }
    }

    fn release_resource(&mut self) -> bool {
        if let Some(observer) = self.observer.take() {
            observer.detach();
        }
        match self.resource.take() {
            Some(mut resource) => {
                debug!("Releasing resource {}", resource.id());
                resource.release();
                true
            }
            None => false,
        }
    }

    fn reset_idle(&mut self) {
        self.current = None;
        self.progress = Progress::default();
        self.pending_seek = None;
        self.set_status(PlaybackStatus::Idle);
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        if self.status != status {
            debug!("Status {} -> {}", self.status, status);
            self.status = status;
            self.emit(SessionEvent::StatusChanged {
                status,
                track_id: self.current.as_ref().map(|t| t.id.clone()),
            });
        }
        self.publish();
    }

    fn emit_progress(&self) {
        if let Some(track) = self.current.as_ref() {
            self.emit(SessionEvent::Progress {
                track_id: track.id.clone(),
                progress: self.progress,
            });
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.state.send_replace(self.snapshot());
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release_resource();
    }
}
