//! Lock-free SPSC queues for control and audio-thread communication.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue is full")]
    Full,
    #[error("queue is empty")]
    Empty,
}

/// Producer half of a bounded single-producer single-consumer queue.
pub struct RingSender<T> {
    inner: HeapProducer<T>,
}

/// Consumer half of a bounded single-producer single-consumer queue.
pub struct RingReceiver<T> {
    inner: HeapConsumer<T>,
}

/// Creates a bounded SPSC queue between the control and audio threads.
pub fn spsc_channel<T>(capacity: usize) -> (RingSender<T>, RingReceiver<T>) {
    let (tx, rx) = HeapRb::new(capacity).split();
    (RingSender { inner: tx }, RingReceiver { inner: rx })
}

impl<T> RingSender<T> {
    /// Attempts to enqueue a value without blocking.
    ///
    /// Returns the original value when the queue is full so callers can
    /// retry or degrade gracefully.
    pub fn try_send(&mut self, value: T) -> Result<(), T> {
        self.inner.push(value)
    }

    /// Number of free slots currently available to the producer.
    pub fn slots(&self) -> usize {
        self.inner.free_len()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }
}

impl<T> RingReceiver<T> {
    pub fn try_recv(&mut self) -> Result<T, QueueError> {
        self.inner.pop().ok_or(QueueError::Empty)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
