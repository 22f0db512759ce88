use crate::models::chunk::AudioChunk;
use crate::models::error::SessionError;
use crate::models::state::SessionState;

/// Receiver of captured audio.
///
/// A session holds at most one observer, by weak reference: the caller owns
/// the observer and keeps it alive for as long as it wants deliveries.
///
/// While running, `on_chunk` is called from the session's delivery thread.
/// The final chunks of a run are delivered by whichever thread ends it:
/// the caller of `stop` (or the thread dropping the session), or the
/// delivery thread after a stream failure. `on_error` and
/// `on_state_changed` follow the same rule, and `Running` is reported on
/// the thread calling `start` before any chunk is delivered. Calls are
/// never concurrent. Return quickly: capture keeps queueing while the
/// observer runs, and a full queue drops its oldest chunks.
pub trait ChunkObserver: Send + Sync {
    /// Called once per chunk, in capture order.
    fn on_chunk(&self, chunk: &AudioChunk);

    /// Called after the session enters a new state.
    fn on_state_changed(&self, _state: SessionState) {}

    /// Called when capture stops because of a device or stream failure.
    fn on_error(&self, _error: &SessionError) {}
}
