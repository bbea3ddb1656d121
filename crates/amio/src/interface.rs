//! The control-side facade contract shared by all interface flavors.

use std::sync::Arc;

use parking_lot::Mutex;

use amio_engine::{ClipId, ImmutableClip};

use crate::audio_clip::{AudioClip, InputAudioChunk};
use crate::error::{Error, Result};

/// Invoked on the pump once per drained input chunk.
pub type InputChunkCallback = Box<dyn FnMut(InputAudioChunk) + Send>;

/// Invoked on the pump with `true` when the submitted playspec became
/// current, `false` when it was superseded before being picked up.
pub type PlayspecResultCallback = Box<dyn FnOnce(bool) + Send>;

/// Clip ids whose last uploaded handle dropped; drained by the pump into
/// destroy-clip messages.
pub(crate) type ReleaseBox = Arc<Mutex<Vec<ClipId>>>;

/// An immutable clip uploaded to an interface. Cloning shares the upload;
/// when the last handle drops, the interface schedules deferred destruction
/// of the storage on the audio thread.
#[derive(Debug, Clone)]
pub struct UploadedClip {
    inner: Arc<UploadedClipInner>,
}

#[derive(Debug)]
struct UploadedClipInner {
    clip: ImmutableClip,
    releases: ReleaseBox,
}

impl Drop for UploadedClipInner {
    fn drop(&mut self) {
        self.releases.lock().push(self.clip.id());
    }
}

impl UploadedClip {
    pub(crate) fn new(clip: ImmutableClip, releases: ReleaseBox) -> Self {
        Self {
            inner: Arc::new(UploadedClipInner { clip, releases }),
        }
    }

    pub(crate) fn engine_clip(&self) -> &ImmutableClip {
        &self.inner.clip
    }

    pub fn frames(&self) -> usize {
        self.inner.clip.frames()
    }

    pub fn channels(&self) -> usize {
        self.inner.clip.channels()
    }

    pub fn frame_rate(&self) -> f64 {
        self.inner.clip.frame_rate()
    }
}

/// Either form of clip a playspec entry may reference. Mutable clips are
/// upgraded to uploaded ones internally when the playspec is submitted.
#[derive(Debug, Clone)]
pub enum ClipSource {
    Mutable(AudioClip),
    Uploaded(UploadedClip),
}

impl From<AudioClip> for ClipSource {
    fn from(clip: AudioClip) -> Self {
        ClipSource::Mutable(clip)
    }
}

impl From<UploadedClip> for ClipSource {
    fn from(clip: UploadedClip) -> Self {
        ClipSource::Uploaded(clip)
    }
}

/// One scheduled occurrence (possibly repeated) of a clip region.
#[derive(Debug, Clone)]
pub struct PlayspecEntry {
    pub clip: ClipSource,
    /// Half-open sample range within the clip.
    pub frame_a: usize,
    pub frame_b: usize,
    /// Transport frame at which the first occurrence begins.
    pub play_at_frame: i64,
    /// Repeat stride in transport frames; 0 means single-shot.
    pub repeat_interval: i64,
    pub gain_l: f32,
    pub gain_r: f32,
}

/// An ordered schedule of entries, built on the control side and handed to
/// [`Interface::schedule_playspec_change`].
#[derive(Debug, Clone, Default)]
pub struct Playspec {
    pub entries: Vec<PlayspecEntry>,
}

impl Playspec {
    pub fn new(entries: Vec<PlayspecEntry>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Control-side interface to an audio I/O driver.
///
/// All operations are non-blocking and must be called from one thread (or be
/// externally serialized). Callbacks run on the interface's pump.
pub trait Interface {
    /// Connects to the audio server under `client_name` and starts the pump.
    fn init(&mut self, client_name: &str) -> Result<()> {
        let _ = client_name;
        Err(Error::Unsupported("init"))
    }

    fn frame_rate(&self) -> Result<f64>;

    fn position(&self) -> Result<i64>;

    fn set_position(&mut self, position: i64) -> Result<()>;

    fn transport_rolling(&self) -> Result<bool>;

    fn set_transport_rolling(&mut self, rolling: bool) -> Result<()>;

    /// Schedules `playspec` to supersede the current one at `insert_at`,
    /// repositioning the playhead to `start_from` when the swap happens.
    /// `on_result` reports whether this submission became current or was
    /// superseded by a later one.
    fn schedule_playspec_change(
        &mut self,
        playspec: Playspec,
        insert_at: i64,
        start_from: i64,
        on_result: Option<PlayspecResultCallback>,
    ) -> Result<()>;

    fn set_input_chunk_callback(&mut self, callback: Option<InputChunkCallback>) -> Result<()>;

    /// Stops the pump and releases the audio-server connection. Idempotent.
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;

    fn secs_to_frame(&self, seconds: f64) -> Result<i64> {
        Ok((self.frame_rate()? * seconds) as i64)
    }

    fn frame_to_secs(&self, frame: i64) -> Result<f64> {
        Ok(frame as f64 / self.frame_rate()?)
    }
}
