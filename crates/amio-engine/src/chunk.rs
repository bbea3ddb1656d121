//! Pooled capture records flowing from the audio thread to the control side.
//!
//! Records are pre-allocated on the control thread and recycled through a
//! free-ring, so the audio thread only ever moves boxes between rings. A
//! callback block longer than [`INPUT_CHUNK_FRAMES`] is split into several
//! records; a shorter block yields one short record.

use std::time::SystemTime;

use amio_rt::ring::{spsc_channel, RingReceiver, RingSender};

use crate::playspec::PlayspecId;

pub const INPUT_CHUNK_FRAMES: usize = 128;
pub const INPUT_CHUNK_CHANNELS: usize = 2;
pub const INPUT_CHUNK_SAMPLES: usize = INPUT_CHUNK_FRAMES * INPUT_CHUNK_CHANNELS;

/// One captured block of interleaved stereo float32 input plus the state of
/// the engine at the moment it was recorded.
#[derive(Debug)]
pub struct InputChunk {
    samples: [f32; INPUT_CHUNK_SAMPLES],
    frames: usize,
    pub playspec_id: PlayspecId,
    pub starting_frame: i64,
    pub was_transport_rolling: bool,
    pub wall_time: SystemTime,
}

impl InputChunk {
    fn blank() -> Box<Self> {
        Box::new(Self {
            samples: [0.0; INPUT_CHUNK_SAMPLES],
            frames: 0,
            playspec_id: PlayspecId::NONE,
            starting_frame: 0,
            was_transport_rolling: false,
            wall_time: SystemTime::UNIX_EPOCH,
        })
    }

    /// Overwrites the payload from planar input buffers.
    pub(crate) fn fill(&mut self, in_l: &[f32], in_r: &[f32]) {
        let frames = in_l.len().min(in_r.len()).min(INPUT_CHUNK_FRAMES);
        for frame in 0..frames {
            self.samples[frame * INPUT_CHUNK_CHANNELS] = in_l[frame];
            self.samples[frame * INPUT_CHUNK_CHANNELS + 1] = in_r[frame];
        }
        self.frames = frames;
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Interleaved stereo samples, `frames * 2` long.
    pub fn samples(&self) -> &[f32] {
        &self.samples[..self.frames * INPUT_CHUNK_CHANNELS]
    }
}

/// Creates the free-ring and pre-fills it with `depth` blank records.
pub fn chunk_pool(depth: usize) -> (RingSender<Box<InputChunk>>, RingReceiver<Box<InputChunk>>) {
    let (mut tx, rx) = spsc_channel(depth);
    for _ in 0..depth {
        let _ = tx.try_send(InputChunk::blank());
    }
    (tx, rx)
}
