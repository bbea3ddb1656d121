//! AMIO Engine
//! ===========
//! The realtime half of the AMIO substrate: immutable audio clips and their
//! deferred-destruction pool, playspec schedules, the per-block mixer, and
//! the lock-free message channels tying it to the control-side facade.

pub mod chunk;
pub mod clip;
pub mod engine;
pub mod msg;
pub mod playspec;
pub mod pool;
pub mod stats;

pub use chunk::{InputChunk, INPUT_CHUNK_CHANNELS, INPUT_CHUNK_FRAMES};
pub use clip::{ClipData, ClipError, ClipId, ImmutableClip};
pub use engine::{EngineConfig, EngineHandle, MixerEngine};
pub use msg::{ClientMessage, EngineMessage, PlayspecRequest};
pub use playspec::{Playspec, PlayspecEntry, PlayspecError, PlayspecId};
pub use pool::ClipPool;
pub use stats::{EngineStats, StatsSnapshot};
