//! Transport state shared between the audio and control threads.
//!
//! The audio thread is the authoritative writer: control-side position and
//! rolling changes travel through the client queue and are applied at block
//! boundaries. Reads from the control side are relaxed snapshots.

use core::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

#[derive(Debug)]
pub struct Transport {
    position: AtomicI64,
    rolling: AtomicBool,
    frame_rate_bits: AtomicU64,
}

impl Transport {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            position: AtomicI64::new(0),
            rolling: AtomicBool::new(false),
            frame_rate_bits: AtomicU64::new(frame_rate.to_bits()),
        }
    }

    pub fn position(&self) -> i64 {
        self.position.load(Ordering::Relaxed)
    }

    pub fn set_position(&self, position: i64) {
        self.position.store(position, Ordering::Relaxed);
    }

    pub fn is_rolling(&self) -> bool {
        self.rolling.load(Ordering::Relaxed)
    }

    pub fn set_rolling(&self, rolling: bool) {
        self.rolling.store(rolling, Ordering::Relaxed);
    }

    pub fn advance(&self, frames: u64) {
        self.position.fetch_add(frames as i64, Ordering::Relaxed);
    }

    pub fn frame_rate(&self) -> f64 {
        f64::from_bits(self.frame_rate_bits.load(Ordering::Relaxed))
    }

    pub fn set_frame_rate(&self, frame_rate: f64) {
        self.frame_rate_bits
            .store(frame_rate.to_bits(), Ordering::Relaxed);
    }

    pub fn seconds(&self) -> f64 {
        let rate = self.frame_rate();
        if rate <= 0.0 {
            return 0.0;
        }
        self.position() as f64 / rate
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(48_000.0)
    }
}

impl Clone for Transport {
    fn clone(&self) -> Self {
        Self {
            position: AtomicI64::new(self.position()),
            rolling: AtomicBool::new(self.is_rolling()),
            frame_rate_bits: AtomicU64::new(self.frame_rate().to_bits()),
        }
    }
}
