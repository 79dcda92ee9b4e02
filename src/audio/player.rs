use super::END_POLL_INTERVAL_MS;
use crate::config::AudioSettings;
use crate::library::ResolvedSource;
use crate::playback::engine::{EngineError, PlaybackEngine, PlaybackResource, ResourceId, ResourceObserver};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// rodio-backed engine. The output stream lives on its own thread because
/// it cannot cross threads; everything else only needs the stream handle.
pub struct RodioEngine {
    stream: OutputStreamHandle,
    runtime: Handle,
    volume: f32,
    fetcher: Fetcher,
    // Dropping this lets the audio thread exit and close the device
    _keepalive: std_mpsc::Sender<()>,
}

impl RodioEngine {
    /// Open the default output device. Must be called inside a tokio runtime.
    pub fn new(settings: &AudioSettings) -> Result<Self, EngineError> {
        let runtime = Handle::try_current()
            .map_err(|e| EngineError::Device(format!("no async runtime: {}", e)))?;
        let (stream, keepalive) = spawn_audio_thread()?;

        Ok(Self {
            stream,
            runtime,
            volume: settings.volume.clamp(0.0, 1.0),
            fetcher: Fetcher::default(),
            _keepalive: keepalive,
        })
    }
}

fn spawn_audio_thread() -> Result<(OutputStreamHandle, std_mpsc::Sender<()>), EngineError> {
    let (handle_tx, handle_rx) = std_mpsc::channel();
    let (keepalive_tx, keepalive_rx) = std_mpsc::channel::<()>();

    thread::Builder::new()
        .name("glowplay-audio".to_string())
        .spawn(move || match OutputStream::try_default() {
            Ok((stream, handle)) => {
                let _ = handle_tx.send(Ok(handle));
                // Blocks until the engine is dropped
                let _ = keepalive_rx.recv();
                drop(stream);
                debug!("Audio output closed");
            }
            Err(e) => {
                let _ = handle_tx.send(Err(EngineError::Device(e.to_string())));
            }
        })
        .map_err(|e| EngineError::Device(format!("failed to start audio thread: {}", e)))?;

    let handle = handle_rx
        .recv()
        .map_err(|_| EngineError::Device("audio thread exited early".to_string()))??;
    info!("Audio output ready");
    Ok((handle, keepalive_tx))
}

impl PlaybackEngine for RodioEngine {
    fn open(
        &mut self,
        source: ResolvedSource,
        observer: ResourceObserver,
    ) -> Result<Box<dyn PlaybackResource>, EngineError> {
        if cfg!(not(feature = "remote")) && source.is_remote() {
            return Err(EngineError::Unsupported(
                "remote sources need the `remote` feature".to_string(),
            ));
        }

        let sink = Sink::try_new(&self.stream).map_err(|e| EngineError::Device(e.to_string()))?;
        sink.pause();
        sink.set_volume(self.volume);

        let shared = Arc::new(Shared {
            sink,
            duration: Mutex::new(None),
            released: AtomicBool::new(false),
        });

        let id = observer.resource();
        let loader = self.runtime.spawn(load_and_watch(
            source,
            shared.clone(),
            observer.clone(),
            self.fetcher.clone(),
        ));

        Ok(Box::new(RodioResource {
            id,
            shared,
            observer,
            loader: Some(loader),
        }))
    }
}

struct Shared {
    sink: Sink,
    duration: Mutex<Option<Duration>>,
    released: AtomicBool,
}

impl Shared {
    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

pub struct RodioResource {
    id: ResourceId,
    shared: Arc<Shared>,
    observer: ResourceObserver,
    loader: Option<JoinHandle<()>>,
}

impl PlaybackResource for RodioResource {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn play(&mut self) -> Result<(), EngineError> {
        if self.shared.is_released() {
            return Err(EngineError::Released(self.id));
        }
        self.shared.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.shared.sink.pause();
    }

    fn position(&self) -> Duration {
        self.shared.sink.get_pos()
    }

    fn duration(&self) -> Option<Duration> {
        *self
            .shared
            .duration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_position(&mut self, position: Duration) -> Result<(), EngineError> {
        if self.shared.is_released() {
            return Err(EngineError::Released(self.id));
        }
        self.shared
            .sink
            .try_seek(position)
            .map_err(|e| EngineError::Decode(format!("seek failed: {:?}", e)))
    }

    fn release(&mut self) {
        if self.shared.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.observer.detach();
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        self.shared.sink.pause();
        self.shared.sink.stop();
        debug!("Released audio resource {}", self.id);
    }
}

impl Drop for RodioResource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Fetch, decode and queue the source paused, report ready, then watch for
/// the sink running dry.
async fn load_and_watch(
    source: ResolvedSource,
    shared: Arc<Shared>,
    observer: ResourceObserver,
    fetcher: Fetcher,
) {
    let bytes = match fetcher.fetch(source).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Audio load failed for resource {}: {}", observer.resource(), e);
            observer.failed(e.to_string());
            return;
        }
    };
    if shared.is_released() {
        return;
    }

    let decoder = match Decoder::new(Cursor::new(bytes)) {
        Ok(decoder) => decoder,
        Err(e) => {
            error!("Decode failed for resource {}: {}", observer.resource(), e);
            observer.failed(e.to_string());
            return;
        }
    };

    let duration = decoder.total_duration();
    *shared.duration.lock().unwrap_or_else(PoisonError::into_inner) = duration;
    shared.sink.append(decoder);
    debug!("Resource {} decoded, duration {:?}", observer.resource(), duration);
    observer.ready(duration);

    let mut poll = tokio::time::interval(Duration::from_millis(END_POLL_INTERVAL_MS));
    loop {
        poll.tick().await;
        if shared.is_released() {
            return;
        }
        if shared.sink.empty() {
            observer.ended();
            return;
        }
    }
}

/// Turns a resolved source into bytes: inline as-is, http(s) over the
/// network, anything else from disk.
#[derive(Clone, Default)]
struct Fetcher {
    #[cfg(feature = "remote")]
    http: reqwest::Client,
}

impl Fetcher {
    async fn fetch(&self, source: ResolvedSource) -> Result<Arc<[u8]>, EngineError> {
        match source {
            ResolvedSource::Inline(bytes) => Ok(bytes),
            #[cfg(feature = "remote")]
            ResolvedSource::Url(url) if source_is_http(&url) => {
                let response = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| EngineError::Fetch(e.to_string()))?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| EngineError::Fetch(e.to_string()))?;
                Ok(Arc::from(bytes.as_ref()))
            }
            ResolvedSource::Url(path) => {
                let path = path.strip_prefix("file://").unwrap_or(&path);
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| EngineError::Fetch(format!("{}: {}", path, e)))?;
                Ok(Arc::from(bytes))
            }
        }
    }
}

#[cfg(feature = "remote")]
fn source_is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_fetch_inline_and_local() {
        let fetcher = Fetcher::default();

        let inline = fetcher
            .fetch(ResolvedSource::Inline(Arc::from(&b"RIFF"[..])))
            .await
            .unwrap();
        assert_eq!(&inline[..], b"RIFF");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ID3data").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let local = fetcher.fetch(ResolvedSource::Url(path.clone())).await.unwrap();
        assert_eq!(&local[..], b"ID3data");

        let prefixed = fetcher
            .fetch(ResolvedSource::Url(format!("file://{}", path)))
            .await
            .unwrap();
        assert_eq!(&prefixed[..], b"ID3data");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_fetch_error() {
        let result = Fetcher::default()
            .fetch(ResolvedSource::Url("/definitely/not/here.mp3".into()))
            .await;
        assert!(matches!(result, Err(EngineError::Fetch(_))));
    }
}
