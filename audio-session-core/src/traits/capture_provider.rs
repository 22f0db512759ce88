use std::sync::Arc;

use crate::models::audio_models::{AudioSource, StreamFormat};
use crate::models::error::SessionError;

/// Callback invoked when a device buffer is available.
///
/// Parameters:
/// - `samples`: Interleaved f32 samples.
/// - `format`: The actual format of the delivered audio.
pub type SampleCallback = Arc<dyn Fn(&[f32], StreamFormat) + Send + Sync + 'static>;

/// Callback invoked when the stream fails and no more buffers will follow.
pub type ErrorCallback = Arc<dyn Fn(SessionError) + Send + Sync + 'static>;

/// Interface for platform-specific audio input backends.
///
/// Implemented by:
/// - `WasapiMicCapture` (Windows)
pub trait CaptureProvider: Send {
    /// Whether the device can be opened right now.
    fn is_available(&self) -> bool;

    /// Start capturing, delivering buffers via `on_samples`.
    ///
    /// `requested` is a hint; providers deliver the format the device
    /// negotiates. Both callbacks fire on the provider's capture thread.
    fn start(
        &mut self,
        requested: StreamFormat,
        on_samples: SampleCallback,
        on_error: ErrorCallback,
    ) -> Result<(), SessionError>;

    /// Stop capturing and release the device. No callback may fire after
    /// this returns.
    fn stop(&mut self) -> Result<(), SessionError>;

    /// Information about the device backing this provider.
    fn device_info(&self) -> AudioSource;
}
