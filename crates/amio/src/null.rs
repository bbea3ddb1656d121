//! Null interface: silence at the capture stream, discarded playback, and a
//! virtual wall clock. Time only moves when the caller advances it, which
//! makes this the workhorse of deterministic tests.

use std::time::{Duration, SystemTime};

use crate::audio_clip::{AudioClip, InputAudioChunk};
use crate::error::{Error, Result};
use crate::interface::{InputChunkCallback, Interface, Playspec, PlayspecResultCallback};

/// 0.1 s at 48 kHz.
pub const NULL_CHUNK_FRAMES: usize = 4_800;

pub struct NullInterface {
    frame_rate: f64,
    position: i64,
    rolling: bool,
    closed: bool,
    current_playspec_id: u64,
    // Held so entry clips stay alive like they would on the audio thread.
    _playspec: Option<Playspec>,
    pending: Vec<(u64, Option<PlayspecResultCallback>)>,
    chunk_callback: Option<InputChunkCallback>,
    time: SystemTime,
}

impl NullInterface {
    pub fn new(frame_rate: f64) -> Self {
        Self::with_starting_time(frame_rate, SystemTime::now())
    }

    pub fn with_starting_time(frame_rate: f64, starting_time: SystemTime) -> Self {
        Self {
            frame_rate,
            position: 0,
            rolling: false,
            closed: false,
            current_playspec_id: 1,
            _playspec: None,
            pending: Vec::new(),
            chunk_callback: None,
            time: starting_time,
        }
    }

    /// Emits one silent chunk stamped with the pre-advance position and
    /// virtual time, resolves playspec acknowledgements, then moves the
    /// playhead (when rolling) and the clock one chunk forward.
    pub fn advance_single_chunk_length(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.resolve_applied();
        let chunk = InputAudioChunk {
            audio: AudioClip::zeros(NULL_CHUNK_FRAMES, 2, self.frame_rate),
            playspec_id: self.current_playspec_id,
            starting_frame: self.position,
            was_transport_rolling: self.rolling,
            wall_time: self.time,
        };
        if self.rolling {
            self.position += NULL_CHUNK_FRAMES as i64;
        }
        self.time += Duration::from_secs_f64(NULL_CHUNK_FRAMES as f64 / self.frame_rate);
        if let Some(callback) = self.chunk_callback.as_mut() {
            callback(chunk);
        }
        Ok(())
    }

    pub fn current_virtual_time(&self) -> SystemTime {
        self.time
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::ClosedInterface);
        }
        Ok(())
    }

    fn resolve_applied(&mut self) {
        let applied = self.current_playspec_id;
        for (id, callback) in self.pending.drain(..) {
            if let Some(callback) = callback {
                callback(id == applied);
            }
        }
    }
}

impl Interface for NullInterface {
    fn frame_rate(&self) -> Result<f64> {
        self.ensure_open()?;
        Ok(self.frame_rate)
    }

    fn position(&self) -> Result<i64> {
        self.ensure_open()?;
        Ok(self.position)
    }

    fn set_position(&mut self, position: i64) -> Result<()> {
        self.ensure_open()?;
        self.position = position;
        Ok(())
    }

    fn transport_rolling(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.rolling)
    }

    fn set_transport_rolling(&mut self, rolling: bool) -> Result<()> {
        self.ensure_open()?;
        self.rolling = rolling;
        Ok(())
    }

    /// Applies immediately: the playhead jumps to `start_from` and the new
    /// playspec becomes current. `insert_at` is not modeled here.
    fn schedule_playspec_change(
        &mut self,
        playspec: Playspec,
        _insert_at: i64,
        start_from: i64,
        on_result: Option<PlayspecResultCallback>,
    ) -> Result<()> {
        self.ensure_open()?;
        self._playspec = Some(playspec);
        self.position = start_from;
        self.current_playspec_id += 1;
        self.pending.push((self.current_playspec_id, on_result));
        Ok(())
    }

    fn set_input_chunk_callback(&mut self, callback: Option<InputChunkCallback>) -> Result<()> {
        self.ensure_open()?;
        self.chunk_callback = callback;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self._playspec = None;
        for (_, callback) in self.pending.drain(..) {
            if let Some(callback) = callback {
                callback(false);
            }
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
