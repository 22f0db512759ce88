//! # audio-session-windows
//!
//! Windows WASAPI microphone backend for `audio-session-core`.
//!
//! Provides:
//! - `WasapiMicCapture`: a `CaptureProvider` over a WASAPI capture endpoint
//! - `DeviceEnumerator`: microphone enumeration via the MMDevice API
//! - `permissions`: Windows microphone privacy check
//!
//! ## Platform Requirements
//! - Windows 10 1803+ for the microphone privacy toggle
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use audio_session_core::AudioCaptureSession;
//! use audio_session_windows::WasapiMicCapture;
//!
//! let mic = WasapiMicCapture::default_device()?;
//! let mut session = AudioCaptureSession::new(mic);
//! session.set_observer(&observer);
//! session.start()?;
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod wasapi_mic;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_mic::WasapiMicCapture;
