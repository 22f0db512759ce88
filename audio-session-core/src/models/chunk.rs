use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::audio_models::StreamFormat;
use crate::processing::pcm;

/// One delivered unit of captured audio.
///
/// Immutable once built. Cloning shares the sample buffer, so an observer
/// that wants to keep a chunk past the callback can clone it cheaply.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    sequence: u64,
    start_frame: u64,
    format: StreamFormat,
    captured_at: DateTime<Utc>,
    samples: Arc<[f32]>,
}

impl AudioChunk {
    pub fn new(
        sequence: u64,
        start_frame: u64,
        format: StreamFormat,
        captured_at: DateTime<Utc>,
        samples: Vec<f32>,
    ) -> Self {
        Self {
            sequence,
            start_frame,
            format,
            captured_at,
            samples: samples.into(),
        }
    }

    /// Position of this chunk within its capture run, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Frame offset of the first frame from the start of the run.
    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Wall-clock time the chunk was completed.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn frame_count(&self) -> usize {
        let channels = self.format.channels.max(1) as usize;
        self.samples.len() / channels
    }

    pub fn duration(&self) -> Duration {
        self.format.frames_to_duration(self.frame_count())
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn rms(&self) -> f32 {
        pcm::rms_level(&self.samples)
    }

    pub fn peak(&self) -> f32 {
        pcm::peak_level(&self.samples)
    }

    /// The chunk as 16-bit little-endian PCM bytes.
    pub fn to_pcm16_le(&self) -> Vec<u8> {
        pcm::to_pcm16_le(&self.samples)
    }
}
