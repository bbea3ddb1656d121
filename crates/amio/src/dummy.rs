//! Dummy interface: no audio path at all. It knows its frame rate and can
//! convert between seconds and frames, which is all some tests need.

use crate::error::{Error, Result};
use crate::interface::{InputChunkCallback, Interface, Playspec, PlayspecResultCallback};

pub struct DummyInterface {
    frame_rate: f64,
}

impl DummyInterface {
    pub fn new(frame_rate: f64) -> Self {
        Self { frame_rate }
    }
}

impl Interface for DummyInterface {
    fn frame_rate(&self) -> Result<f64> {
        Ok(self.frame_rate)
    }

    fn position(&self) -> Result<i64> {
        Err(Error::Unsupported("position"))
    }

    fn set_position(&mut self, _position: i64) -> Result<()> {
        Err(Error::Unsupported("set_position"))
    }

    fn transport_rolling(&self) -> Result<bool> {
        Err(Error::Unsupported("transport_rolling"))
    }

    fn set_transport_rolling(&mut self, _rolling: bool) -> Result<()> {
        Err(Error::Unsupported("set_transport_rolling"))
    }

    fn schedule_playspec_change(
        &mut self,
        _playspec: Playspec,
        _insert_at: i64,
        _start_from: i64,
        _on_result: Option<PlayspecResultCallback>,
    ) -> Result<()> {
        Err(Error::Unsupported("schedule_playspec_change"))
    }

    fn set_input_chunk_callback(&mut self, _callback: Option<InputChunkCallback>) -> Result<()> {
        Err(Error::Unsupported("set_input_chunk_callback"))
    }

    fn close(&mut self) -> Result<()> {
        Err(Error::Unsupported("close"))
    }

    fn is_closed(&self) -> bool {
        false
    }
}
