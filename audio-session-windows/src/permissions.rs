//! Windows microphone privacy check.
//!
//! On Windows 10 1803+, microphone access is gated by Settings > Privacy >
//! Microphone. Unpackaged desktop apps get no consent prompt; a disabled
//! toggle shows up as `E_ACCESSDENIED` when activating the audio client.

use windows::core::HRESULT;
use windows::Win32::Foundation::E_ACCESSDENIED;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_session_core::models::error::SessionError;

use crate::com::ComScope;

/// Check whether the default microphone can be opened by this process.
///
/// Returns `Ok(false)` when there is no capture device or access is denied.
/// Callable from any thread, including one already in an STA.
pub fn check_microphone_permission() -> Result<bool, SessionError> {
    let _com = ComScope::enter()?;
    unsafe { check_mic_access_inner() }
}

unsafe fn check_mic_access_inner() -> Result<bool, SessionError> {
    let enumerator: IMMDeviceEnumerator =
        CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|e| {
            SessionError::Unknown(format!("failed to create enumerator: {}", e))
        })?;

    let Ok(device) = enumerator.GetDefaultAudioEndpoint(eCapture, eConsole) else {
        return Ok(false);
    };

    match device.Activate::<IAudioClient>(CLSCTX_ALL, None) {
        Ok(_) => Ok(true),
        Err(e) => match activation_error(e.code()) {
            SessionError::PermissionDenied => Ok(false),
            other => {
                log::warn!("unexpected error checking mic permission: {}", other);
                Ok(true)
            }
        },
    }
}

/// Map a failed `IMMDevice::Activate` or `IAudioClient::Initialize` to a
/// session error.
pub(crate) fn activation_error(code: HRESULT) -> SessionError {
    if code == E_ACCESSDENIED {
        SessionError::PermissionDenied
    } else if code == AUDCLNT_E_DEVICE_IN_USE {
        SessionError::StreamFailed("device is in exclusive use by another application".into())
    } else if code == AUDCLNT_E_DEVICE_INVALIDATED {
        SessionError::DeviceNotAvailable
    } else {
        SessionError::StreamFailed(format!(
            "audio client activation failed: {}",
            code.message()
        ))
    }
}
