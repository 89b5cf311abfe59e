//! Bounded chunk queue for playback backpressure.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::AudioChunk;

/// A fixed-capacity FIFO of audio chunks.
///
/// Decouples a playback producer from the runner's device loop. The queue
/// never grows past its capacity: a push against a full queue hands the
/// chunk back to the caller instead of dropping or blocking. Both ends are
/// non-blocking; the producer layers its own cooperative wait on top (see
/// `OutputTrack::write`), which keeps the runner side real-time safe.
///
/// Internally locked; safe for one producer and one consumer on different
/// threads without any external lock.
pub(crate) struct ChunkQueue {
    inner: Mutex<VecDeque<AudioChunk>>,
    capacity: usize,
}

impl ChunkQueue {
    /// Creates a queue holding at most `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Attempts to enqueue a chunk.
    ///
    /// Returns the chunk back via `Err` when the queue is full.
    pub fn try_push(&self, chunk: AudioChunk) -> Result<(), AudioChunk> {
        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity {
            return Err(chunk);
        }
        inner.push_back(chunk);
        Ok(())
    }

    /// Dequeues the oldest chunk, or `None` when empty.
    pub fn try_pop(&self) -> Option<AudioChunk> {
        self.inner.lock().pop_front()
    }

    /// Discards all queued chunks.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Returns the number of chunks currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
