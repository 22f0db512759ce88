//! Test doubles for providers and observers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::audio_models::{AudioSource, AudioTransportType, StreamFormat};
use crate::models::chunk::AudioChunk;
use crate::models::error::SessionError;
use crate::models::state::SessionState;
use crate::traits::capture_provider::{CaptureProvider, ErrorCallback, SampleCallback};
use crate::traits::chunk_observer::ChunkObserver;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn test_device() -> AudioSource {
    AudioSource {
        id: format!("test-mic-{}", Uuid::new_v4()),
        name: "Test Microphone".into(),
        is_default: true,
        transport_type: Some(AudioTransportType::Virtual),
    }
}

#[derive(Default)]
struct ManualState {
    callbacks: Option<(SampleCallback, ErrorCallback)>,
    format: Option<StreamFormat>,
    starts: u32,
    stops: u32,
}

/// Drives a `ManualProvider` from the test thread.
#[derive(Clone, Default)]
pub struct ManualHandle {
    state: Arc<Mutex<ManualState>>,
}

impl ManualHandle {
    /// Deliver a buffer synchronously. Returns false if the provider is not streaming.
    pub fn push(&self, samples: &[f32]) -> bool {
        let (callback, format) = {
            let state = self.state.lock();
            match (&state.callbacks, state.format) {
                (Some((on_samples, _)), Some(format)) => (Arc::clone(on_samples), format),
                _ => return false,
            }
        };
        callback(samples, format);
        true
    }

    /// Report a stream failure.
    pub fn fail(&self, error: SessionError) {
        let callback = self
            .state
            .lock()
            .callbacks
            .as_ref()
            .map(|(_, on_error)| Arc::clone(on_error));
        if let Some(on_error) = callback {
            on_error(error);
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().callbacks.is_some()
    }

    pub fn start_count(&self) -> u32 {
        self.state.lock().starts
    }

    pub fn stop_count(&self) -> u32 {
        self.state.lock().stops
    }
}

/// Provider whose buffers are pushed by the test through a `ManualHandle`.
pub struct ManualProvider {
    device: AudioSource,
    handle: ManualHandle,
    available: bool,
    fail_next_start: Option<SessionError>,
}

impl ManualProvider {
    pub fn new() -> (Self, ManualHandle) {
        Self::for_device(test_device())
    }

    pub fn for_device(device: AudioSource) -> (Self, ManualHandle) {
        let handle = ManualHandle::default();
        let provider = Self {
            device,
            handle: handle.clone(),
            available: true,
            fail_next_start: None,
        };
        (provider, handle)
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn fail_next_start(&mut self, error: SessionError) {
        self.fail_next_start = Some(error);
    }
}

impl CaptureProvider for ManualProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(
        &mut self,
        requested: StreamFormat,
        on_samples: SampleCallback,
        on_error: ErrorCallback,
    ) -> Result<(), SessionError> {
        if let Some(error) = self.fail_next_start.take() {
            return Err(error);
        }
        let mut state = self.handle.state.lock();
        state.starts += 1;
        state.format = Some(requested);
        state.callbacks = Some((on_samples, on_error));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        let mut state = self.handle.state.lock();
        state.stops += 1;
        state.callbacks = None;
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        self.device.clone()
    }
}

/// Provider that emits a counting signal from its own thread until stopped.
pub struct ThreadedProvider {
    device: AudioSource,
    frames_per_buffer: usize,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ThreadedProvider {
    pub fn new(frames_per_buffer: usize) -> Self {
        Self {
            device: test_device(),
            frames_per_buffer,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl CaptureProvider for ThreadedProvider {
    fn is_available(&self) -> bool {
        true
    }

    fn start(
        &mut self,
        requested: StreamFormat,
        on_samples: SampleCallback,
        _on_error: ErrorCallback,
    ) -> Result<(), SessionError> {
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let len = self.frames_per_buffer * requested.channels as usize;

        let handle = thread::Builder::new()
            .name("test-capture".into())
            .spawn(move || {
                let mut counter = 0u64;
                while running.load(Ordering::SeqCst) {
                    let buffer: Vec<f32> = (0..len)
                        .map(|i| ((counter + i as u64) % 1000) as f32 / 1000.0)
                        .collect();
                    counter += len as u64;
                    on_samples(&buffer, requested);
                    thread::sleep(Duration::from_millis(1));
                }
            })
            .map_err(|e| SessionError::Unknown(e.to_string()))?;

        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        self.device.clone()
    }
}

/// Observer that records everything it is told.
#[derive(Default)]
pub struct RecordingObserver {
    chunks: Mutex<Vec<AudioChunk>>,
    states: Mutex<Vec<SessionState>>,
    errors: Mutex<Vec<SessionError>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn chunks(&self) -> Vec<AudioChunk> {
        self.chunks.lock().clone()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().clone()
    }

    pub fn errors(&self) -> Vec<SessionError> {
        self.errors.lock().clone()
    }
}

impl ChunkObserver for RecordingObserver {
    fn on_chunk(&self, chunk: &AudioChunk) {
        self.chunks.lock().push(chunk.clone());
    }

    fn on_state_changed(&self, state: SessionState) {
        self.states.lock().push(state);
    }

    fn on_error(&self, error: &SessionError) {
        self.errors.lock().push(error.clone());
    }
}
