pub mod chunk_queue;
pub mod chunker;
pub mod pcm;
