//! # audio-session-core
//!
//! Platform-agnostic audio capture session library.
//!
//! An [`AudioCaptureSession`] owns the start/stop lifecycle of one input
//! device and delivers captured audio, framed into [`AudioChunk`]s, to a
//! single registered [`ChunkObserver`]. Platform backends (Windows WASAPI)
//! implement the [`CaptureProvider`] trait and plug into the session.
//!
//! ## Architecture
//!
//! ```text
//! audio-session-core (this crate)
//! ├── traits/       ← CaptureProvider, ChunkObserver
//! ├── models/       ← SessionError, SessionState, SessionConfig, AudioChunk, StreamFormat
//! ├── processing/   ← Chunker, ChunkQueue, PCM level helpers
//! └── session/      ← AudioCaptureSession, HardwareLease
//! ```
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_session_core::{AudioCaptureSession, AudioChunk, ChunkObserver};
//!
//! struct Sink;
//! impl ChunkObserver for Sink {
//!     fn on_chunk(&self, chunk: &AudioChunk) {
//!         send_to_socket(&chunk.to_pcm16_le());
//!     }
//! }
//!
//! let sink = Arc::new(Sink);
//! let mut session = AudioCaptureSession::new(WasapiMicCapture::default_device()?);
//! session.set_observer(&sink);
//! session.start()?;
//! // ...
//! session.stop()?;
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{
    AudioLevels, AudioSource, AudioTransportType, SessionDiagnostics, StreamFormat,
};
pub use models::chunk::AudioChunk;
pub use models::config::SessionConfig;
pub use models::error::SessionError;
pub use models::state::SessionState;
pub use processing::chunk_queue::ChunkQueue;
pub use processing::chunker::Chunker;
pub use session::capture_session::AudioCaptureSession;
pub use session::hardware::HardwareLease;
pub use traits::capture_provider::{CaptureProvider, ErrorCallback, SampleCallback};
pub use traits::chunk_observer::ChunkObserver;
