// In-memory engine for session and driver tests. Resources record what was
// done to them; tests drive their events by index in open order.

use super::engine::{EngineError, PlaybackEngine, PlaybackResource, ResourceId, ResourceObserver};
use crate::library::ResolvedSource;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeResourceState {
    pub source: ResolvedSource,
    pub observer: ResourceObserver,
    pub playing: bool,
    pub released: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
}

#[derive(Default)]
struct Shared {
    resources: Vec<FakeResourceState>,
    fail_next_open: Option<String>,
    auto_ready: Option<Option<Duration>>,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    shared: Arc<Mutex<Shared>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report ready with `duration` as soon as a resource opens.
    pub fn auto_ready(self, duration: Option<Duration>) -> Self {
        self.shared.lock().unwrap().auto_ready = Some(duration);
        self
    }

    pub fn fail_next_open(&self, message: &str) {
        self.shared.lock().unwrap().fail_next_open = Some(message.to_string());
    }

    pub fn opened(&self) -> usize {
        self.shared.lock().unwrap().resources.len()
    }

    pub fn live_count(&self) -> usize {
        self.shared
            .lock()
            .unwrap()
            .resources
            .iter()
            .filter(|r| !r.released)
            .count()
    }

    pub fn state(&self, index: usize) -> FakeResourceState {
        self.shared.lock().unwrap().resources[index].clone()
    }

    pub fn set_position(&self, index: usize, position: Duration) {
        self.shared.lock().unwrap().resources[index].position = position;
    }

    /// Give the resource a duration without sending an event for it.
    pub fn set_duration(&self, index: usize, duration: Duration) {
        self.shared.lock().unwrap().resources[index].duration = Some(duration);
    }

    pub fn emit_ready(&self, index: usize, duration: Option<Duration>) {
        let observer = {
            let mut shared = self.shared.lock().unwrap();
            let state = &mut shared.resources[index];
            state.duration = duration;
            state.observer.clone()
        };
        observer.ready(duration);
    }

    pub fn emit_duration(&self, index: usize, duration: Duration) {
        let observer = {
            let mut shared = self.shared.lock().unwrap();
            let state = &mut shared.resources[index];
            state.duration = Some(duration);
            state.observer.clone()
        };
        observer.duration_known(duration);
    }

    pub fn emit_ended(&self, index: usize) {
        self.state(index).observer.ended();
    }

    pub fn emit_failed(&self, index: usize, message: &str) {
        self.state(index).observer.failed(message);
    }
}

impl PlaybackEngine for FakeEngine {
    fn open(
        &mut self,
        source: ResolvedSource,
        observer: ResourceObserver,
    ) -> Result<Box<dyn PlaybackResource>, EngineError> {
        let mut shared = self.shared.lock().unwrap();
        if let Some(message) = shared.fail_next_open.take() {
            return Err(EngineError::Decode(message));
        }

        let auto_ready = shared.auto_ready;
        let index = shared.resources.len();
        shared.resources.push(FakeResourceState {
            source,
            observer: observer.clone(),
            playing: false,
            released: false,
            position: Duration::ZERO,
            duration: auto_ready.flatten(),
        });
        drop(shared);

        if let Some(duration) = auto_ready {
            observer.ready(duration);
        }

        Ok(Box::new(FakeResource {
            id: observer.resource(),
            index,
            shared: self.shared.clone(),
        }))
    }
}

struct FakeResource {
    id: ResourceId,
    index: usize,
    shared: Arc<Mutex<Shared>>,
}

impl FakeResource {
    fn with<T>(&self, f: impl FnOnce(&mut FakeResourceState) -> T) -> T {
        let mut shared = self.shared.lock().unwrap();
        f(&mut shared.resources[self.index])
    }
}

impl PlaybackResource for FakeResource {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn play(&mut self) -> Result<(), EngineError> {
        let id = self.id;
        self.with(|state| {
            if state.released {
                return Err(EngineError::Released(id));
            }
            state.playing = true;
            Ok(())
        })
    }

    fn pause(&mut self) {
        self.with(|state| state.playing = false);
    }

    fn position(&self) -> Duration {
        self.with(|state| state.position)
    }

    fn duration(&self) -> Option<Duration> {
        self.with(|state| state.duration)
    }

    fn set_position(&mut self, position: Duration) -> Result<(), EngineError> {
        let id = self.id;
        self.with(|state| {
            if state.released {
                return Err(EngineError::Released(id));
            }
            state.position = position;
            Ok(())
        })
    }

    fn release(&mut self) {
        self.with(|state| {
            state.observer.detach();
            state.playing = false;
            state.released = true;
        });
    }
}
