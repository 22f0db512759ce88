use std::collections::VecDeque;

use crate::models::chunk::AudioChunk;

/// Bounded FIFO of chunks between the capture thread and the delivery thread.
///
/// Wrap in `Arc<parking_lot::Mutex<ChunkQueue>>` for cross-thread access.
///
/// Overflow behavior: drops the oldest chunks so the capture thread never
/// waits on a slow observer.
#[derive(Debug)]
pub struct ChunkQueue {
    chunks: VecDeque<AudioChunk>,
    capacity: usize,
}

impl ChunkQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a chunk, returning how many old chunks were dropped to make room.
    pub fn push(&mut self, chunk: AudioChunk) -> usize {
        let mut dropped = 0;
        while self.chunks.len() >= self.capacity {
            self.chunks.pop_front();
            dropped += 1;
        }
        self.chunks.push_back(chunk);
        dropped
    }

    /// Append several chunks in order, returning the total dropped.
    pub fn push_all(&mut self, chunks: impl IntoIterator<Item = AudioChunk>) -> usize {
        chunks.into_iter().map(|chunk| self.push(chunk)).sum()
    }

    pub fn pop(&mut self) -> Option<AudioChunk> {
        self.chunks.pop_front()
    }

    /// Remove and return every queued chunk, oldest first.
    pub fn drain(&mut self) -> Vec<AudioChunk> {
        self.chunks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
