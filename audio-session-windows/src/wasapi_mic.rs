//! WASAPI microphone capture provider.
//!
//! Captures audio from a WASAPI capture endpoint (microphone) in shared mode
//! and hands the device's native Float32 buffers to the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use windows::core::{Error, GUID, PCWSTR};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use audio_session_core::models::audio_models::{AudioSource, AudioTransportType, StreamFormat};
use audio_session_core::models::error::SessionError;
use audio_session_core::traits::capture_provider::{CaptureProvider, ErrorCallback, SampleCallback};

use crate::com::ComScope;
use crate::device_enumerator::DeviceEnumerator;
use crate::permissions;

// mmreg.h / ksmedia.h values.
const FORMAT_TAG_IEEE_FLOAT: u16 = 0x0003;
const FORMAT_TAG_EXTENSIBLE: u16 = 0xFFFE;
const SUBTYPE_IEEE_FLOAT: GUID = GUID::from_u128(0x00000003_0000_0010_8000_00aa00389b71);

/// How long `start` waits for the capture thread to open the device.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// WASAPI microphone capture.
///
/// Opens a capture endpoint in shared mode and delivers audio buffers on a
/// dedicated thread registered with MMCSS. `start` returns only once the
/// device is open, so device errors surface from `start` rather than as a
/// stream fault.
pub struct WasapiMicCapture {
    device_id: Option<String>,
    device_name: String,
    is_default: bool,
    transport_type: Option<AudioTransportType>,
    running: Arc<AtomicBool>,
    negotiated: Arc<Mutex<Option<StreamFormat>>>,
    capture_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl WasapiMicCapture {
    /// Capture from the system default microphone.
    pub fn default_device() -> Result<Self, SessionError> {
        Ok(Self::build(None, "Default Microphone".into(), true, None))
    }

    /// Capture from a specific microphone, as listed by `DeviceEnumerator`.
    pub fn with_device(source: &AudioSource) -> Self {
        Self::build(
            Some(source.id.clone()),
            source.name.clone(),
            source.is_default,
            source.transport_type,
        )
    }

    fn build(
        device_id: Option<String>,
        device_name: String,
        is_default: bool,
        transport_type: Option<AudioTransportType>,
    ) -> Self {
        Self {
            device_id,
            device_name,
            is_default,
            transport_type,
            running: Arc::new(AtomicBool::new(false)),
            negotiated: Arc::new(Mutex::new(None)),
            capture_handle: Mutex::new(None),
        }
    }

    /// The device mix format, once capture has started.
    pub fn negotiated_format(&self) -> Option<StreamFormat> {
        *self.negotiated.lock()
    }
}

impl CaptureProvider for WasapiMicCapture {
    fn is_available(&self) -> bool {
        let has_device = match DeviceEnumerator::new().and_then(|e| e.list_capture_devices()) {
            Ok(devices) => device_present(&devices, self.device_id.as_deref()),
            Err(e) => {
                log::warn!("capture device enumeration failed: {}", e);
                false
            }
        };
        has_device
            && permissions::check_microphone_permission().unwrap_or_else(|e| {
                log::warn!("microphone permission check failed: {}", e);
                false
            })
    }

    fn start(
        &mut self,
        requested: StreamFormat,
        on_samples: SampleCallback,
        on_error: ErrorCallback,
    ) -> Result<(), SessionError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SessionError::AlreadyRunning);
        }

        // Shared mode always captures at the mix format; the request is informational.
        log::debug!(
            "opening {} (requested {}, using device mix format)",
            self.device_name,
            requested
        );

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let negotiated = Arc::clone(&self.negotiated);
        let device_id = self.device_id.clone();
        let (opened_tx, opened_rx) = mpsc::sync_channel(1);

        let handle = thread::Builder::new()
            .name("wasapi-mic-capture".into())
            .spawn(move || {
                let mut opened = false;
                let result = mic_capture_loop(&running, device_id, &on_samples, |format| {
                    *negotiated.lock() = Some(format);
                    opened = true;
                    let _ = opened_tx.send(Ok(()));
                });
                if let Err(e) = result {
                    // Before the device opened, `start` reports the error.
                    // Afterwards it is a stream fault.
                    if opened {
                        log::error!("mic capture error: {}", e);
                        on_error(e);
                    } else {
                        let _ = opened_tx.send(Err(e));
                    }
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SessionError::Unknown(format!("failed to spawn mic thread: {}", e))
            })?;

        *self.capture_handle.lock() = Some(handle);

        match opened_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.stop()?;
                Err(e)
            }
            Err(_) => {
                self.stop()?;
                Err(SessionError::StreamFailed("timed out opening capture device".into()))
            }
        }
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.lock().take() {
            if handle.join().is_err() {
                return Err(SessionError::Unknown("mic capture thread panicked".into()));
            }
        }
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: self.device_id.clone().unwrap_or_else(|| "default-mic".into()),
            name: self.device_name.clone(),
            is_default: self.is_default,
            transport_type: self.transport_type,
        }
    }
}

/// Accept only 32-bit IEEE float samples, plain or wrapped in `WAVEFORMATEXTENSIBLE`.
fn check_float32(tag: u16, bits: u16, sub_format: Option<GUID>) -> Result<(), String> {
    let is_float = match tag {
        FORMAT_TAG_IEEE_FLOAT => true,
        FORMAT_TAG_EXTENSIBLE => sub_format == Some(SUBTYPE_IEEE_FLOAT),
        _ => false,
    };
    if !is_float || bits != 32 {
        return Err(format!(
            "unsupported mix format: tag {:#06x}, {} bits per sample",
            tag, bits
        ));
    }
    Ok(())
}

/// Whether the selected device (or any device, for the default one) is listed.
fn device_present(devices: &[AudioSource], device_id: Option<&str>) -> bool {
    match device_id {
        Some(id) => devices.iter().any(|d| d.id == id),
        None => !devices.is_empty(),
    }
}

/// Capture loop running on a dedicated thread.
///
/// Sequence:
/// 1. Enter the MTA
/// 2. Get capture device (default or by ID)
/// 3. Activate IAudioClient, read the mix format
/// 4. Initialize in shared mode
/// 5. Get IAudioCaptureClient service
/// 6. Register with MMCSS for real-time priority
/// 7. Start capture, report `opened`, poll for buffers until `running` clears
fn mic_capture_loop(
    running: &AtomicBool,
    device_id: Option<String>,
    on_samples: &SampleCallback,
    opened: impl FnOnce(StreamFormat),
) -> Result<(), SessionError> {
    unsafe {
        let _com = ComScope::enter()?;

        let enumerator: IMMDeviceEnumerator =
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|_| SessionError::DeviceNotAvailable)?;

        let device = if let Some(ref id) = device_id {
            let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
            enumerator
                .GetDevice(PCWSTR(wide_id.as_ptr()))
                .map_err(|_| SessionError::DeviceNotAvailable)?
        } else {
            enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .map_err(|_| SessionError::DeviceNotAvailable)?
        };

        let audio_client: IAudioClient = device
            .Activate(CLSCTX_ALL, None)
            .map_err(|e| permissions::activation_error(e.code()))?;

        let mix_format_ptr = audio_client
            .GetMixFormat()
            .map_err(|e| SessionError::StreamFailed(format!("GetMixFormat failed: {}", e)))?;
        let _format_guard = CoTaskMemGuard(mix_format_ptr as *const _);

        let mix_format = &*mix_format_ptr;
        let (tag, bits) = (mix_format.wFormatTag, mix_format.wBitsPerSample);
        let sub_format = if tag == FORMAT_TAG_EXTENSIBLE {
            let extensible = &*(mix_format_ptr as *const WAVEFORMATEXTENSIBLE);
            Some(extensible.SubFormat)
        } else {
            None
        };
        check_float32(tag, bits, sub_format).map_err(SessionError::StreamFailed)?;
        let format = StreamFormat::new(mix_format.nSamplesPerSec, mix_format.nChannels);

        // Buffer duration: 100ms in 100-nanosecond units
        let buffer_duration = 1_000_000;

        audio_client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_NOPERSIST,
                buffer_duration,
                0,
                mix_format,
                None,
            )
            .map_err(|e| permissions::activation_error(e.code()))?;

        let capture_client: IAudioCaptureClient = audio_client
            .GetService()
            .map_err(|e| SessionError::StreamFailed(format!("GetService failed: {}", e)))?;

        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        if AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index).is_err() {
            log::warn!("MMCSS registration failed, capturing at normal priority");
        }

        audio_client
            .Start()
            .map_err(|e| SessionError::StreamFailed(format!("IAudioClient::Start failed: {}", e)))?;

        opened(format);

        let result = drain_packets(running, &capture_client, format, on_samples);
        let _ = audio_client.Stop();
        result
    }
}

/// Poll the capture client every 10ms and forward each packet.
unsafe fn drain_packets(
    running: &AtomicBool,
    capture_client: &IAudioCaptureClient,
    format: StreamFormat,
    on_samples: &SampleCallback,
) -> Result<(), SessionError> {
    let packet_error =
        |e: Error| SessionError::StreamFailed(format!("capture packet failed: {}", e));

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(10));

        let mut packet_length = capture_client.GetNextPacketSize().map_err(packet_error)?;
        while packet_length > 0 {
            let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
            let mut num_frames: u32 = 0;
            let mut flags: u32 = 0;

            capture_client
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .map_err(packet_error)?;

            if num_frames > 0 && !buffer_ptr.is_null() {
                let total_samples = num_frames as usize * format.channels as usize;
                if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                    let silence = vec![0.0f32; total_samples];
                    on_samples(&silence, format);
                } else {
                    let samples =
                        std::slice::from_raw_parts(buffer_ptr as *const f32, total_samples);
                    on_samples(samples, format);
                }
            }

            capture_client.ReleaseBuffer(num_frames).map_err(packet_error)?;
            packet_length = capture_client.GetNextPacketSize().map_err(packet_error)?;
        }
    }
    Ok(())
}

/// RAII guard freeing COM-allocated memory (the mix format).
struct CoTaskMemGuard(*const std::ffi::c_void);

impl Drop for CoTaskMemGuard {
    fn drop(&mut self) {
        unsafe {
            CoTaskMemFree(Some(self.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMAT_TAG_PCM: u16 = 0x0001;
    const SUBTYPE_PCM: GUID = GUID::from_u128(0x00000001_0000_0010_8000_00aa00389b71);

    #[test]
    fn only_float32_mix_formats_are_accepted() {
        assert!(check_float32(FORMAT_TAG_IEEE_FLOAT, 32, None).is_ok());
        assert!(check_float32(FORMAT_TAG_EXTENSIBLE, 32, Some(SUBTYPE_IEEE_FLOAT)).is_ok());

        assert!(check_float32(FORMAT_TAG_PCM, 32, None).is_err());
        assert!(check_float32(FORMAT_TAG_EXTENSIBLE, 32, Some(SUBTYPE_PCM)).is_err());
        assert!(check_float32(FORMAT_TAG_EXTENSIBLE, 32, None).is_err());
        assert!(check_float32(FORMAT_TAG_IEEE_FLOAT, 64, None).is_err());
    }

    #[test]
    fn selected_device_must_be_listed() {
        let devices = vec![AudioSource {
            id: "{0.0.1.00000000}.{mic}".into(),
            name: "Microphone".into(),
            is_default: true,
            transport_type: Some(AudioTransportType::Usb),
        }];

        assert!(device_present(&devices, None));
        assert!(device_present(&devices, Some("{0.0.1.00000000}.{mic}")));
        assert!(!device_present(&devices, Some("{0.0.1.00000000}.{gone}")));
        assert!(!device_present(&[], None));
    }
}
