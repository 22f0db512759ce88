//! Capture device enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list active microphone endpoints with
//! friendly names and transport types.

use std::marker::PhantomData;

use windows::core::PWSTR;
use windows::Win32::Devices::FunctionDiscovery::{
    PKEY_Device_EnumeratorName, PKEY_Device_FriendlyName,
};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_session_core::models::audio_models::{AudioSource, AudioTransportType};
use audio_session_core::models::error::SessionError;

use crate::com::ComScope;

/// Microphone enumerator using the Windows MMDevice API.
///
/// Holds its own COM scope, so it must stay on the thread that created it.
pub struct DeviceEnumerator {
    // Declared before `_com` so the interface is released before COM is torn down.
    enumerator: IMMDeviceEnumerator,
    _com: ComScope,
    _not_send: PhantomData<*const ()>,
}

impl DeviceEnumerator {
    /// Create a new device enumerator on the calling thread.
    ///
    /// Joins the thread's COM apartment, initialising one if needed.
    pub fn new() -> Result<Self, SessionError> {
        let com = ComScope::enter()?;
        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }.map_err(|e| {
                SessionError::Unknown(format!("failed to create enumerator: {}", e))
            })?;
        Ok(Self {
            enumerator,
            _com: com,
            _not_send: PhantomData,
        })
    }

    /// List active capture (microphone) devices.
    pub fn list_capture_devices(&self) -> Result<Vec<AudioSource>, SessionError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .map_err(|e| SessionError::Unknown(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| SessionError::Unknown(format!("GetCount failed: {}", e)))?;

            let default_id = self.default_capture_device_id().ok();

            let mut devices = Vec::new();
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Some(id) = device_id(&device) else {
                    continue;
                };

                let store = device.OpenPropertyStore(STGM_READ).ok();
                let name = store
                    .as_ref()
                    .and_then(|s| s.GetValue(&PKEY_Device_FriendlyName).ok())
                    .map(|value| value.to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("Microphone {}", i));
                let transport = store
                    .as_ref()
                    .and_then(|s| s.GetValue(&PKEY_Device_EnumeratorName).ok())
                    .map(|value| transport_from_enumerator(&value.to_string()))
                    .unwrap_or(AudioTransportType::Unknown);

                devices.push(AudioSource {
                    is_default: default_id.as_deref() == Some(id.as_str()),
                    id,
                    name,
                    transport_type: Some(transport),
                });
            }

            Ok(devices)
        }
    }

    /// Get the default capture device ID.
    pub fn default_capture_device_id(&self) -> Result<String, SessionError> {
        unsafe {
            let device = self
                .enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .map_err(|_| SessionError::DeviceNotAvailable)?;
            device_id(&device).ok_or_else(|| SessionError::Unknown("GetId failed".into()))
        }
    }
}

unsafe fn device_id(device: &IMMDevice) -> Option<String> {
    let id: PWSTR = device.GetId().ok()?;
    let value = id.to_string().ok();
    CoTaskMemFree(Some(id.0 as *const _));
    value
}

/// Map `PKEY_Device_EnumeratorName` to a transport type.
fn transport_from_enumerator(enumerator: &str) -> AudioTransportType {
    let upper = enumerator.to_uppercase();
    if upper.contains("BTHLEENUM") {
        AudioTransportType::BluetoothLE
    } else if upper.contains("BTHENUM") {
        AudioTransportType::Bluetooth
    } else if upper.contains("USB") {
        AudioTransportType::Usb
    } else if upper.contains("ROOT") || upper.contains("SWD") {
        AudioTransportType::Virtual
    } else {
        AudioTransportType::BuiltIn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_detection() {
        assert_eq!(transport_from_enumerator("BTHENUM"), AudioTransportType::Bluetooth);
        assert_eq!(transport_from_enumerator("BTHLEENUM"), AudioTransportType::BluetoothLE);
        assert_eq!(transport_from_enumerator("USB"), AudioTransportType::Usb);
        assert_eq!(transport_from_enumerator("HDAUDIO"), AudioTransportType::BuiltIn);
    }

    #[test]
    fn enumerates_from_a_thread_without_com() {
        std::thread::spawn(|| {
            let enumerator = DeviceEnumerator::new().unwrap();
            assert!(enumerator.list_capture_devices().is_ok());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn enumerates_from_a_single_threaded_apartment() {
        std::thread::spawn(|| {
            unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok().unwrap() };
            {
                let enumerator = DeviceEnumerator::new().unwrap();
                assert!(enumerator.list_capture_devices().is_ok());
            }
            unsafe { CoUninitialize() };
        })
        .join()
        .unwrap();
    }
}
