use chrono::Utc;

use crate::models::audio_models::StreamFormat;
use crate::models::chunk::AudioChunk;

/// Frames raw device buffers into `AudioChunk`s.
///
/// With a fixed size, samples accumulate across device callbacks and a chunk
/// is emitted every `frames_per_chunk` frames. Without one, each device
/// buffer becomes its own chunk.
///
/// A chunk never mixes formats: when the device format changes, the pending
/// partial chunk is emitted first.
#[derive(Debug)]
pub struct Chunker {
    frames_per_chunk: Option<usize>,
    pending: Vec<f32>,
    format: Option<StreamFormat>,
    next_sequence: u64,
    next_frame: u64,
}

impl Chunker {
    pub fn new(frames_per_chunk: Option<usize>) -> Self {
        Self {
            frames_per_chunk,
            pending: Vec::new(),
            format: None,
            next_sequence: 0,
            next_frame: 0,
        }
    }

    /// Add a device buffer, returning every chunk it completes.
    pub fn push(&mut self, samples: &[f32], format: StreamFormat) -> Vec<AudioChunk> {
        let mut chunks = Vec::new();

        if self.format.is_some_and(|current| current != format) {
            log::debug!("stream format changed to {}, flushing partial chunk", format);
            chunks.extend(self.flush());
        }
        self.format = Some(format);

        if samples.is_empty() {
            return chunks;
        }

        let channels = format.channels.max(1) as usize;
        let Some(frames_per_chunk) = self.frames_per_chunk else {
            // Pass-through: keep whole frames only.
            let whole = samples.len() - samples.len() % channels;
            if whole > 0 {
                chunks.push(self.emit(samples[..whole].to_vec(), format));
            }
            return chunks;
        };

        self.pending.extend_from_slice(samples);
        let chunk_samples = frames_per_chunk * channels;
        while self.pending.len() >= chunk_samples {
            let rest = self.pending.split_off(chunk_samples);
            let full = std::mem::replace(&mut self.pending, rest);
            chunks.push(self.emit(full, format));
        }
        chunks
    }

    /// Emit the pending whole frames as a short chunk.
    ///
    /// Samples that do not make up a whole frame are discarded.
    pub fn flush(&mut self) -> Option<AudioChunk> {
        let format = self.format?;
        let channels = format.channels.max(1) as usize;
        let whole = self.pending.len() - self.pending.len() % channels;
        if whole == 0 {
            self.pending.clear();
            return None;
        }
        self.pending.truncate(whole);
        let samples = std::mem::take(&mut self.pending);
        Some(self.emit(samples, format))
    }

    /// Samples waiting for the next chunk boundary.
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }

    /// Forget pending samples and restart sequence numbering.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.format = None;
        self.next_sequence = 0;
        self.next_frame = 0;
    }

    fn emit(&mut self, samples: Vec<f32>, format: StreamFormat) -> AudioChunk {
        let chunk = AudioChunk::new(
            self.next_sequence,
            self.next_frame,
            format,
            Utc::now(),
            samples,
        );
        self.next_sequence += 1;
        self.next_frame += chunk.frame_count() as u64;
        chunk
    }
}
