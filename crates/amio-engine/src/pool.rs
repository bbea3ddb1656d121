//! Control-side registry of clip storage.
//!
//! The pool holds the primary reference for every uploaded clip. Dropping a
//! clip is a protocol, not a free: the control side posts `DestroyClip`, the
//! audio thread acknowledges with `ClipDestroyed` once no live playspec
//! references the clip, and only then does [`ClipPool::finalize`] drop the
//! primary reference here.

use std::collections::HashMap;
use std::sync::Arc;

use crate::clip::{ClipData, ClipId, ImmutableClip};

#[derive(Debug, Default)]
pub struct ClipPool {
    next_id: u64,
    clips: HashMap<ClipId, Arc<ClipData>>,
}

impl ClipPool {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            clips: HashMap::new(),
        }
    }

    /// Registers clip storage and returns a shared handle to it.
    pub fn insert(&mut self, data: ClipData) -> ImmutableClip {
        let id = ClipId::from_raw(self.next_id);
        self.next_id += 1;
        let data = Arc::new(data);
        self.clips.insert(id, data.clone());
        ImmutableClip::new(id, data)
    }

    /// Drops the primary reference after the audio thread has acknowledged
    /// the destruction. Unknown ids are ignored.
    pub fn finalize(&mut self, id: ClipId) {
        self.clips.remove(&id);
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.clips.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}
