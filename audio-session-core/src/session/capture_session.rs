use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::audio_models::{AudioLevels, AudioSource, SessionDiagnostics, StreamFormat};
use crate::models::config::SessionConfig;
use crate::models::error::SessionError;
use crate::models::state::SessionState;
use crate::processing::chunk_queue::ChunkQueue;
use crate::processing::chunker::Chunker;
use crate::processing::pcm;
use crate::session::hardware::HardwareLease;
use crate::traits::capture_provider::{CaptureProvider, ErrorCallback, SampleCallback};
use crate::traits::chunk_observer::ChunkObserver;

/// Mutable session state shared with the capture and delivery threads.
struct SharedState {
    state: SessionState,
    levels: AudioLevels,
    diagnostics: SessionDiagnostics,
    last_error: Option<SessionError>,
    // Set by the provider's error callback, consumed by the delivery thread.
    fault: Option<SessionError>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            state: SessionState::Stopped,
            levels: AudioLevels::default(),
            diagnostics: SessionDiagnostics::default(),
            last_error: None,
            fault: None,
        }
    }
}

/// Everything the capture callback and the delivery thread touch.
#[derive(Clone)]
struct Pipeline {
    shared: Arc<Mutex<SharedState>>,
    observer: Arc<RwLock<Option<Weak<dyn ChunkObserver>>>>,
    chunker: Arc<Mutex<Chunker>>,
    queue: Arc<Mutex<ChunkQueue>>,
    lease: Arc<Mutex<Option<HardwareLease>>>,
    accepting: Arc<AtomicBool>,
}

impl Pipeline {
    fn new(config: &SessionConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SharedState::new())),
            observer: Arc::new(RwLock::new(None)),
            chunker: Arc::new(Mutex::new(Chunker::new(config.frames_per_chunk))),
            queue: Arc::new(Mutex::new(ChunkQueue::new(config.queue_capacity))),
            lease: Arc::new(Mutex::new(None)),
            accepting: Arc::new(AtomicBool::new(false)),
        }
    }

    fn observer(&self) -> Option<Arc<dyn ChunkObserver>> {
        self.observer.read().as_ref().and_then(Weak::upgrade)
    }

    fn sample_callback(&self) -> SampleCallback {
        let pipeline = self.clone();
        Arc::new(move |samples: &[f32], format: StreamFormat| {
            if !pipeline.accepting.load(Ordering::SeqCst) {
                return;
            }

            // Hold the chunker while queueing so chunks enter the queue in order.
            let (framed, dropped) = {
                let mut chunker = pipeline.chunker.lock();
                let chunks = chunker.push(samples, format);
                let framed = chunks.len() as u64;
                let dropped = if chunks.is_empty() {
                    0
                } else {
                    pipeline.queue.lock().push_all(chunks) as u64
                };
                (framed, dropped)
            };

            if dropped > 0 {
                log::debug!("delivery queue full, dropped {} oldest chunk(s)", dropped);
            }

            let mut s = pipeline.shared.lock();
            s.levels = AudioLevels {
                rms: pcm::rms_level(samples),
                peak: pcm::peak_level(samples),
            };
            s.diagnostics.buffer_callbacks += 1;
            s.diagnostics.samples_captured += samples.len() as u64;
            s.diagnostics.chunks_framed += framed;
            s.diagnostics.chunks_dropped += dropped;
            s.diagnostics.last_format = Some(format);
        })
    }

    fn error_callback(&self) -> ErrorCallback {
        let pipeline = self.clone();
        Arc::new(move |error: SessionError| {
            if !pipeline.accepting.swap(false, Ordering::SeqCst) {
                return;
            }
            log::error!("capture stream failed: {}", error);
            let mut s = pipeline.shared.lock();
            if s.fault.is_none() {
                s.fault = Some(error);
            }
        })
    }

    /// Hand every queued chunk to the observer, oldest first.
    fn deliver_pending(&self) {
        let chunks = self.queue.lock().drain();
        for chunk in chunks {
            // Upgrade per chunk so a replaced observer takes effect immediately.
            match self.observer() {
                Some(observer) => {
                    observer.on_chunk(&chunk);
                    let mut s = self.shared.lock();
                    s.diagnostics.chunks_delivered += 1;
                    s.diagnostics.last_chunk_at = Some(chunk.captured_at());
                }
                None => self.shared.lock().diagnostics.chunks_discarded += 1,
            }
        }
    }

    /// Queue the pending partial chunk, if any.
    fn flush_tail(&self) {
        let mut chunker = self.chunker.lock();
        if let Some(tail) = chunker.flush() {
            let dropped = self.queue.lock().push(tail) as u64;
            let mut s = self.shared.lock();
            s.diagnostics.chunks_framed += 1;
            s.diagnostics.chunks_dropped += dropped;
        }
    }

    /// Deliver what was captured, release the device and enter `Stopped`.
    fn finish(&self, error: Option<SessionError>) {
        self.accepting.store(false, Ordering::SeqCst);
        self.flush_tail();
        self.deliver_pending();
        self.lease.lock().take();

        let was_running = {
            let mut s = self.shared.lock();
            let was_running = s.state.is_running();
            s.state = SessionState::Stopped;
            if let Some(ref error) = error {
                s.last_error = Some(error.clone());
            }
            was_running
        };

        if let Some(observer) = self.observer() {
            if let Some(ref error) = error {
                observer.on_error(error);
            }
            if was_running {
                observer.on_state_changed(SessionState::Stopped);
            }
        }
    }
}

/// Resources held between a successful `start` and the matching teardown.
struct ActiveCapture {
    delivery_running: Arc<AtomicBool>,
    delivery_handle: Option<thread::JoinHandle<()>>,
}

/// Audio capture session: owns the on/off lifecycle of one input device and
/// delivers captured chunks to a single observer.
///
/// Data flow:
/// ```text
/// [Provider thread] → [Chunker] → [ChunkQueue]
///     → [audio-delivery thread] → ChunkObserver::on_chunk
/// ```
///
/// `start` and `stop` take `&mut self`; share a session across threads by
/// wrapping it in a mutex.
pub struct AudioCaptureSession<P: CaptureProvider> {
    id: Uuid,
    provider: P,
    config: SessionConfig,
    pipeline: Pipeline,
    active: Option<ActiveCapture>,
}

impl<P: CaptureProvider> AudioCaptureSession<P> {
    /// Create a stopped session with the default configuration.
    pub fn new(provider: P) -> Self {
        let config = SessionConfig::default();
        Self {
            id: Uuid::new_v4(),
            provider,
            pipeline: Pipeline::new(&config),
            config,
            active: None,
        }
    }

    /// Create a stopped session after validating `config`.
    pub fn with_config(provider: P, config: SessionConfig) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::InvalidConfiguration)?;
        Ok(Self {
            id: Uuid::new_v4(),
            provider,
            pipeline: Pipeline::new(&config),
            config,
            active: None,
        })
    }

    /// Replace the configuration. Only allowed while stopped.
    pub fn configure(&mut self, config: SessionConfig) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        config.validate().map_err(SessionError::InvalidConfiguration)?;
        // A run that ended in a stream fault still owns its provider thread.
        self.teardown();
        *self.pipeline.chunker.lock() = Chunker::new(config.frames_per_chunk);
        *self.pipeline.queue.lock() = ChunkQueue::new(config.queue_capacity);
        self.config = config;
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.pipeline.shared.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Levels of the most recent device buffer.
    pub fn current_levels(&self) -> AudioLevels {
        self.pipeline.shared.lock().levels
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.pipeline.shared.lock().diagnostics.clone()
    }

    /// The failure that ended the last run, if any. Cleared by `start`.
    pub fn last_error(&self) -> Option<SessionError> {
        self.pipeline.shared.lock().last_error.clone()
    }

    pub fn device_info(&self) -> AudioSource {
        self.provider.device_info()
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    /// Register the observer, replacing any previous one.
    ///
    /// The session keeps only a weak reference. Takes effect from the next
    /// delivered chunk.
    pub fn set_observer<O: ChunkObserver + 'static>(&self, observer: &Arc<O>) {
        let observer: Arc<dyn ChunkObserver> = observer.clone();
        *self.pipeline.observer.write() = Some(Arc::downgrade(&observer));
    }

    pub fn clear_observer(&self) {
        *self.pipeline.observer.write() = None;
    }

    /// Whether a live observer is registered.
    pub fn has_observer(&self) -> bool {
        self.pipeline.observer().is_some()
    }

    /// Start capturing. Transitions: stopped → running.
    ///
    /// Fails with `AlreadyRunning` if the session is running, and with
    /// `DeviceBusy` if another session holds the device.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }

        // A run that ended in a stream fault still owns its provider thread.
        self.teardown();

        if !self.provider.is_available() {
            return Err(SessionError::DeviceNotAvailable);
        }

        let device = self.provider.device_info();
        let lease = HardwareLease::acquire(&device.id, self.id)?;

        self.pipeline.chunker.lock().reset();
        self.pipeline.queue.lock().clear();
        {
            let mut s = self.pipeline.shared.lock();
            s.levels = AudioLevels::default();
            s.diagnostics = SessionDiagnostics::default();
            s.last_error = None;
            s.fault = None;
        }
        *self.pipeline.lease.lock() = Some(lease);
        self.pipeline.accepting.store(true, Ordering::SeqCst);

        let started = self.provider.start(
            self.config.requested_format(),
            self.pipeline.sample_callback(),
            self.pipeline.error_callback(),
        );
        if let Err(e) = started {
            self.abort_start();
            log::error!("session {} failed to start on {}: {}", self.id, device.name, e);
            return Err(e);
        }

        self.pipeline.shared.lock().state = SessionState::Running;
        // Reported before the delivery thread exists, so it precedes every chunk.
        if let Some(observer) = self.pipeline.observer() {
            observer.on_state_changed(SessionState::Running);
        }

        let delivery_running = Arc::new(AtomicBool::new(true));
        let handle = match self.spawn_delivery_thread(Arc::clone(&delivery_running)) {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(stop_err) = self.provider.stop() {
                    log::warn!("provider stop after failed start: {}", stop_err);
                }
                self.pipeline.finish(None);
                return Err(e);
            }
        };

        self.active = Some(ActiveCapture {
            delivery_running,
            delivery_handle: Some(handle),
        });

        log::info!(
            "session {} capturing from {} (requested {})",
            self.id,
            device.name,
            self.config.requested_format()
        );
        Ok(())
    }

    /// Stop capturing. Transitions: running → stopped.
    ///
    /// Synchronous: every captured sample has been delivered, including a
    /// final short chunk, and no delivery happens after this returns.
    /// Stopping a stopped session is a no-op.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if self.active.is_none() {
            return Ok(());
        }
        self.teardown();
        log::info!("session {} stopped", self.id);
        Ok(())
    }

    // --- Internal helpers ---

    fn spawn_delivery_thread(
        &self,
        running: Arc<AtomicBool>,
    ) -> Result<thread::JoinHandle<()>, SessionError> {
        let pipeline = self.pipeline.clone();
        let interval = self.config.delivery_interval();

        thread::Builder::new()
            .name("audio-delivery".into())
            .spawn(move || delivery_loop(pipeline, running, interval))
            .map_err(|e| SessionError::Unknown(format!("failed to spawn delivery thread: {}", e)))
    }

    fn abort_start(&mut self) {
        self.pipeline.accepting.store(false, Ordering::SeqCst);
        self.pipeline.lease.lock().take();
        self.pipeline.queue.lock().clear();
        self.pipeline.shared.lock().fault = None;
    }

    /// Stop the provider and the delivery thread, then drain on this thread.
    fn teardown(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        if let Err(e) = self.provider.stop() {
            log::warn!("session {}: provider stop failed: {}", self.id, e);
        }

        active.delivery_running.store(false, Ordering::SeqCst);
        if let Some(handle) = active.delivery_handle.take() {
            if handle.join().is_err() {
                log::error!("session {}: delivery thread panicked", self.id);
            }
        }

        let fault = self.pipeline.shared.lock().fault.take();
        self.pipeline.finish(fault);
    }
}

impl<P: CaptureProvider> Drop for AudioCaptureSession<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn delivery_loop(pipeline: Pipeline, running: Arc<AtomicBool>, interval: Duration) {
    while running.load(Ordering::SeqCst) {
        thread::sleep(interval);

        pipeline.deliver_pending();

        let fault = pipeline.shared.lock().fault.take();
        if let Some(error) = fault {
            pipeline.finish(Some(error));
            break;
        }
    }
}
