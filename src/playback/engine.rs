//! Playback resources and the engines that create them.
//!
//! A resource is bound to one resolved source for its whole life. The session
//! owns at most one at a time and always calls [`PlaybackResource::release`]
//! before dropping it. Engines report asynchronous progress of a resource
//! (ready, duration, end, error) through its [`ResourceObserver`].

use crate::library::ResolvedSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub type ResourceId = u64;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("unsupported source: {0}")]
    Unsupported(String),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("failed to fetch audio: {0}")]
    Fetch(String),

    #[error("resource {0} was already released")]
    Released(ResourceId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEventKind {
    /// Decoded and ready to start; duration if the container knows it.
    Ready { duration: Option<Duration> },
    /// Duration learned after ready (streams, late metadata).
    DurationKnown(Duration),
    /// Natural end of track.
    Ended,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    pub resource: ResourceId,
    pub kind: ResourceEventKind,
}

pub type ResourceEventSender = mpsc::UnboundedSender<ResourceEvent>;
pub type ResourceEventReceiver = mpsc::UnboundedReceiver<ResourceEvent>;

pub fn resource_channel() -> (ResourceEventSender, ResourceEventReceiver) {
    mpsc::unbounded_channel()
}

/// Per-resource event sink handed to the engine. Once detached nothing more
/// is delivered, whichever clone tries.
#[derive(Debug, Clone)]
pub struct ResourceObserver {
    resource: ResourceId,
    tx: ResourceEventSender,
    detached: Arc<AtomicBool>,
}

impl ResourceObserver {
    pub fn new(resource: ResourceId, tx: ResourceEventSender) -> Self {
        Self {
            resource,
            tx,
            detached: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn ready(&self, duration: Option<Duration>) {
        self.emit(ResourceEventKind::Ready { duration });
    }

    pub fn duration_known(&self, duration: Duration) {
        self.emit(ResourceEventKind::DurationKnown(duration));
    }

    pub fn ended(&self) {
        self.emit(ResourceEventKind::Ended);
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.emit(ResourceEventKind::Failed(message.into()));
    }

    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    fn emit(&self, kind: ResourceEventKind) {
        if self.is_detached() {
            return;
        }
        // Receiver gone means the session is shutting down
        let _ = self.tx.send(ResourceEvent {
            resource: self.resource,
            kind,
        });
    }
}

/// Creates resources. `open` starts loading and returns immediately; it must
/// not start audible playback.
pub trait PlaybackEngine: Send {
    fn open(
        &mut self,
        source: ResolvedSource,
        observer: ResourceObserver,
    ) -> Result<Box<dyn PlaybackResource>, EngineError>;
}

/// One decode/output handle, exclusively owned by the session.
pub trait PlaybackResource: Send {
    fn id(&self) -> ResourceId;

    fn play(&mut self) -> Result<(), EngineError>;

    fn pause(&mut self);

    fn position(&self) -> Duration;

    fn duration(&self) -> Option<Duration>;

    fn set_position(&mut self, position: Duration) -> Result<(), EngineError>;

    /// Detach the observer, pause, drop the source and free the output.
    /// Must be idempotent.
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_observer_is_silent() {
        let (tx, mut rx) = resource_channel();
        let observer = ResourceObserver::new(7, tx);
        let clone = observer.clone();

        observer.ready(None);
        observer.detach();
        clone.ended();
        clone.failed("late");

        assert_eq!(
            rx.try_recv().unwrap(),
            ResourceEvent {
                resource: 7,
                kind: ResourceEventKind::Ready { duration: None }
            }
        );
        assert!(rx.try_recv().is_err());
        assert!(clone.is_detached());
    }
}
