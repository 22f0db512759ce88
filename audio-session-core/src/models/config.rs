use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::StreamFormat;
use super::error::SessionError;

/// Configuration for a capture session.
///
/// Every field has a default, so a host application can embed a partial
/// section in its own config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Requested sample rate in Hz (default: 16000).
    pub sample_rate: u32,

    /// Requested channel count (default: 1). Valid values: 1, 2.
    pub channels: u16,

    /// Frames per delivered chunk (default: 1024).
    /// `None` delivers each device buffer as its own chunk.
    pub frames_per_chunk: Option<usize>,

    /// Chunks held between the capture and delivery threads before the
    /// oldest is dropped (default: 64).
    pub queue_capacity: usize,

    /// How often the delivery thread drains the queue, in milliseconds (default: 10).
    pub delivery_interval_ms: u64,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.frames_per_chunk == Some(0) {
            return Err("frames per chunk must be positive".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue capacity must be positive".into());
        }
        if self.delivery_interval_ms == 0 || self.delivery_interval_ms > 1000 {
            return Err(format!(
                "delivery interval must be within 1..=1000 ms, got {}",
                self.delivery_interval_ms
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON config section.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            SessionError::InvalidConfiguration(format!("failed to parse config: {}", e))
        })?;
        config.validate().map_err(SessionError::InvalidConfiguration)?;
        Ok(config)
    }

    /// The format requested from the provider.
    pub fn requested_format(&self) -> StreamFormat {
        StreamFormat::new(self.sample_rate, self.channels)
    }

    pub fn delivery_interval(&self) -> Duration {
        Duration::from_millis(self.delivery_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frames_per_chunk: Some(1024),
            queue_capacity: 64,
            delivery_interval_ms: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            SessionConfig { sample_rate: 0, ..Default::default() },
            SessionConfig { channels: 6, ..Default::default() },
            SessionConfig { frames_per_chunk: Some(0), ..Default::default() },
            SessionConfig { queue_capacity: 0, ..Default::default() },
            SessionConfig { delivery_interval_ms: 0, ..Default::default() },
            SessionConfig { delivery_interval_ms: 5000, ..Default::default() },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "sample_rate": 48000, "frames_per_chunk": null }"#;
        let config = SessionConfig::from_json(json).unwrap();

        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.frames_per_chunk, None);
        assert_eq!(config.channels, 1);
        assert_eq!(config.queue_capacity, 64);
    }

    #[test]
    fn json_is_validated() {
        let err = SessionConfig::from_json(r#"{ "channels": 0 }"#).unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfiguration(_)));

        let err = SessionConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfiguration(_)));
    }
}
