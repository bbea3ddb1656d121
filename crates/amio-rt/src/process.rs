//! Audio callback contract shared between the engine and server backends.

use std::cell::UnsafeCell;
use std::sync::Arc;

/// Planar stereo buffers for one audio callback, float32 in [-1, 1].
pub struct StereoBuffers<'a> {
    pub in_l: &'a [f32],
    pub in_r: &'a [f32],
    pub out_l: &'a mut [f32],
    pub out_r: &'a mut [f32],
    pub frames: usize,
}

impl StereoBuffers<'_> {
    pub fn silence(&mut self) {
        self.out_l.fill(0.0);
        self.out_r.fill(0.0);
    }
}

/// Trait implemented by the realtime mixer.
pub trait RtProcessor: Send {
    fn process(&mut self, io: &mut StereoBuffers<'_>);
}

struct ProcessorCell {
    processor: UnsafeCell<Box<dyn RtProcessor>>,
}

unsafe impl Send for ProcessorCell {}
unsafe impl Sync for ProcessorCell {}

/// A handle shared with server backends for triggering realtime processing.
#[derive(Clone)]
pub struct CallbackHandle {
    inner: Arc<ProcessorCell>,
}

impl CallbackHandle {
    pub fn new(processor: Box<dyn RtProcessor>) -> Self {
        Self {
            inner: Arc::new(ProcessorCell {
                processor: UnsafeCell::new(processor),
            }),
        }
    }

    pub fn process(&self, io: &mut StereoBuffers<'_>) {
        // Safety: backends call this from the single thread that owns the stream.
        unsafe {
            let processor = &mut *self.inner.processor.get();
            processor.process(io);
        }
    }
}
