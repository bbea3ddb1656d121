//! Lock-free counters shared between the audio thread and the control side.

use core::sync::atomic::{AtomicU64, Ordering};

/// Failure modes on the audio thread are never fatal; they are drops, and
/// drops are counted here.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub blocks: AtomicU64,
    pub dropped_chunks: AtomicU64,
    pub dropped_messages: AtomicU64,
    /// Fallback deallocations performed on the audio thread because a
    /// return chute overflowed.
    pub rt_frees: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub blocks: u64,
    pub dropped_chunks: u64,
    pub dropped_messages: u64,
    pub rt_frees: u64,
}

impl EngineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks: self.blocks.load(Ordering::Relaxed),
            dropped_chunks: self.dropped_chunks.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
            rt_frees: self.rt_frees.load(Ordering::Relaxed),
        }
    }
}
