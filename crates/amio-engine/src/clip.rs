//! Immutable 16-bit PCM clips referenced by playspec entries.

use std::fmt;
use std::sync::Arc;

/// Float samples map to int16 through this scale in both directions.
pub const I16_SCALE: f32 = 32_767.0;

/// Identifier handed out by the clip pool; 0 is reserved for "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(u64);

impl ClipId {
    pub const NONE: ClipId = ClipId(0);

    pub(crate) fn from_raw(raw: u64) -> Self {
        ClipId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("clip must have at least one channel")]
    NoChannels,
    #[error("clip data length is not a multiple of the frame size")]
    MisalignedData,
}

/// Raw clip storage: interleaved native-endian int16 samples plus the
/// channel count and nominal frame rate.
#[derive(Debug)]
pub struct ClipData {
    samples: Box<[i16]>,
    channels: usize,
    frame_rate: f64,
}

impl ClipData {
    pub fn from_i16(samples: Vec<i16>, channels: usize, frame_rate: f64) -> Result<Self, ClipError> {
        if channels == 0 {
            return Err(ClipError::NoChannels);
        }
        if samples.len() % channels != 0 {
            return Err(ClipError::MisalignedData);
        }
        Ok(Self {
            samples: samples.into_boxed_slice(),
            channels,
            frame_rate,
        })
    }

    /// Builds clip storage from float samples in [-1, 1], interleaved.
    /// Out-of-range values are clipped, then scaled to int16.
    pub fn from_f32(samples: &[f32], channels: usize, frame_rate: f64) -> Result<Self, ClipError> {
        let converted = samples
            .iter()
            .map(|&sample| (sample * I16_SCALE).clamp(-I16_SCALE, I16_SCALE) as i16)
            .collect();
        Self::from_i16(converted, channels, frame_rate)
    }

    /// Builds clip storage from a raw byte buffer of native-endian int16
    /// samples. The length must be a multiple of `channels * 2`.
    pub fn from_pcm_bytes(bytes: &[u8], channels: usize, frame_rate: f64) -> Result<Self, ClipError> {
        if channels == 0 {
            return Err(ClipError::NoChannels);
        }
        if bytes.len() % (channels * 2) != 0 {
            return Err(ClipError::MisalignedData);
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self {
            samples,
            channels,
            frame_rate,
        })
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }
}

/// A pool-registered clip. Cloning is cheap; the underlying storage is
/// shared and never mutated.
#[derive(Debug, Clone)]
pub struct ImmutableClip {
    id: ClipId,
    data: Arc<ClipData>,
}

impl ImmutableClip {
    pub(crate) fn new(id: ClipId, data: Arc<ClipData>) -> Self {
        Self { id, data }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn frames(&self) -> usize {
        self.data.frames()
    }

    pub fn channels(&self) -> usize {
        self.data.channels()
    }

    pub fn frame_rate(&self) -> f64 {
        self.data.frame_rate()
    }

    pub fn samples(&self) -> &[i16] {
        self.data.samples()
    }
}
