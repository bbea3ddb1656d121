//! Message types carried by the two SPSC queues.
//!
//! Ordering is FIFO within each queue; nothing is guaranteed across queues.

use std::sync::Arc;

use crate::chunk::InputChunk;
use crate::clip::ClipId;
use crate::playspec::{Playspec, PlayspecId};

/// A playspec submission. At most one may be outstanding at a time; the
/// facade defers later submissions until the previous one is acknowledged.
#[derive(Debug)]
pub struct PlayspecRequest {
    pub playspec: Arc<Playspec>,
    pub id: PlayspecId,
    /// Transport frame at which the new playspec supersedes the previous
    /// one, approximated to the containing block boundary.
    pub insert_at: i64,
    /// Playhead frame after the swap.
    pub start_from: i64,
}

/// Control thread to audio thread.
#[derive(Debug)]
pub enum ClientMessage {
    SetTransportRolling(bool),
    SetPosition(i64),
    SetPlayspec(PlayspecRequest),
    DestroyClip(ClipId),
}

/// Audio thread to control thread.
#[derive(Debug)]
pub enum EngineMessage {
    /// The identified playspec finished its first mixed block.
    PlayspecApplied(PlayspecId),
    /// Ownership chute: a superseded playspec, returned so that it (and the
    /// clip references inside it) deallocate on the control thread.
    PlayspecRetired(Arc<Playspec>),
    /// The clip is no longer referenced by any live playspec; the control
    /// side may release its storage.
    ClipDestroyed(ClipId),
    InputChunk(Box<InputChunk>),
}
