use thiserror::Error;

/// Errors that can occur while running an audio capture session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("device {device_id} is held by another session")]
    DeviceBusy { device_id: String },

    #[error("session is already running")]
    AlreadyRunning,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("stream failed: {0}")]
    StreamFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
