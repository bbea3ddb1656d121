//! Control-side audio data: mutable float clips and captured input chunks.

use std::path::Path;
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::fader::factor_to_db;

const I16_SCALE: f32 = 32_767.0;

/// Float audio data on the control thread: one buffer per channel, samples
/// in [-1, 1]. This is the mutable working form; it is converted to the
/// immutable int16 form when a playspec referencing it is submitted.
#[derive(Debug, Clone, Default)]
pub struct AudioClip {
    channels: Vec<Vec<f32>>,
    frame_rate: f64,
}

impl AudioClip {
    /// Builds a clip from per-channel buffers. Shorter channels are padded
    /// with silence to the longest one.
    pub fn from_channels(channels: Vec<Vec<f32>>, frame_rate: f64) -> Result<Self> {
        if channels.is_empty() {
            return Err(Error::InvalidArgument(
                "clip must have at least one channel".into(),
            ));
        }
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        let channels = channels
            .into_iter()
            .map(|mut channel| {
                channel.resize(frames, 0.0);
                channel
            })
            .collect();
        Ok(Self {
            channels,
            frame_rate,
        })
    }

    /// Builds a clip from interleaved samples.
    pub fn from_interleaved(samples: &[f32], channels: usize, frame_rate: f64) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidArgument(
                "clip must have at least one channel".into(),
            ));
        }
        if samples.len() % channels != 0 {
            return Err(Error::InvalidArgument(
                "sample count is not a multiple of the channel count".into(),
            ));
        }
        let frames = samples.len() / channels;
        let mut data = vec![Vec::with_capacity(frames); channels];
        for frame in 0..frames {
            for (channel, buffer) in data.iter_mut().enumerate() {
                buffer.push(samples[frame * channels + channel]);
            }
        }
        Ok(Self {
            channels: data,
            frame_rate,
        })
    }

    pub fn zeros(frames: usize, channels: usize, frame_rate: f64) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channels],
            frame_rate,
        }
    }

    pub fn sine(
        frequency: f64,
        amplitude: f32,
        frames: usize,
        channels: usize,
        frame_rate: f64,
    ) -> Self {
        let wave: Vec<f32> = (0..frames)
            .map(|frame| {
                let phase = 2.0 * std::f64::consts::PI * frequency * frame as f64 / frame_rate;
                amplitude * phase.sin() as f32
            })
            .collect();
        Self {
            channels: vec![wave; channels],
            frame_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.frame_rate <= 0.0 {
            return 0.0;
        }
        self.frames() as f64 / self.frame_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(index).map(Vec::as_mut_slice)
    }

    /// Extracts one channel as a new mono clip.
    pub fn channel_clip(&self, index: usize) -> Result<AudioClip> {
        let channel = self
            .channels
            .get(index)
            .ok_or_else(|| Error::InvalidArgument(format!("no channel {index}")))?;
        Ok(AudioClip {
            channels: vec![channel.clone()],
            frame_rate: self.frame_rate,
        })
    }

    /// Interleaved int16 form used for upload: scaled by 32767 and clipped.
    pub fn interleaved_i16(&self) -> Vec<i16> {
        let frames = self.frames();
        let mut data = Vec::with_capacity(frames * self.channels.len());
        for frame in 0..frames {
            for channel in &self.channels {
                data.push((channel[frame] * I16_SCALE).clamp(-I16_SCALE, I16_SCALE) as i16);
            }
        }
        data
    }

    /// Total signal power over the whole clip duration, in dB.
    pub fn rms_power_db(&self) -> f64 {
        let samples = self.frames() * self.channels();
        if samples == 0 {
            return f64::NEG_INFINITY;
        }
        let sum: f64 = self
            .channels
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&sample| sample as f64 * sample as f64)
            .sum();
        factor_to_db((sum / samples as f64).sqrt())
    }

    /// Per-fragment RMS power (dB) at roughly `fps` fragments per second of
    /// audio. Always yields at least one fragment.
    pub fn metering_data(&self, fps: f64) -> Vec<f64> {
        let frames = self.frames();
        let window = self.frame_rate / fps;
        let fragments = if window <= 0.0 {
            1
        } else {
            ((frames as f64 / window) as usize).max(1)
        };
        (0..fragments)
            .map(|fragment| {
                let begin = frames * fragment / fragments;
                let end = frames * (fragment + 1) / fragments;
                let samples = (end - begin) * self.channels();
                if samples == 0 {
                    return f64::NEG_INFINITY;
                }
                let sum: f64 = self
                    .channels
                    .iter()
                    .flat_map(|channel| channel[begin..end].iter())
                    .map(|&sample| sample as f64 * sample as f64)
                    .sum();
                factor_to_db((sum / samples as f64).sqrt())
            })
            .collect()
    }

    /// Resizes in place, truncating or zero-padding every channel.
    pub fn resize(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.resize(frames, 0.0);
        }
    }

    /// Overwrites part of this clip with `patch`, starting at `position`
    /// (in frames, may be negative to clip the patch head). `clip_a..clip_b`
    /// bounds the patch region; `clip_b = None` means the patch end. With
    /// `extend_to_fit` the clip grows to hold the whole patch, otherwise
    /// the overhang is discarded.
    pub fn overwrite_range(
        &mut self,
        patch: &AudioClip,
        position: i64,
        clip_a: usize,
        clip_b: Option<usize>,
        extend_to_fit: bool,
    ) -> Result<()> {
        if patch.channels() != self.channels() {
            return Err(Error::InvalidArgument(
                "patch channel count does not match".into(),
            ));
        }
        let mut clip_a = clip_a as i64;
        let mut clip_b = clip_b.unwrap_or(patch.frames()).min(patch.frames()) as i64;
        let mut position = position;
        if position < 0 {
            clip_a -= position;
            position = 0;
        }
        let mut inserted = clip_b - clip_a;
        if inserted <= 0 {
            return Ok(());
        }
        let position = position as usize;
        if position > self.frames() && !extend_to_fit {
            return Ok(());
        }
        if position as i64 + inserted > self.frames() as i64 {
            if extend_to_fit {
                self.resize(position + inserted as usize);
            } else {
                let cut = position as i64 + inserted - self.frames() as i64;
                inserted -= cut;
                clip_b -= cut;
            }
        }
        if inserted <= 0 || clip_a >= clip_b {
            return Ok(());
        }
        let (clip_a, clip_b) = (clip_a as usize, clip_b as usize);
        for (destination, source) in self.channels.iter_mut().zip(&patch.channels) {
            destination[position..position + (clip_b - clip_a)]
                .copy_from_slice(&source[clip_a..clip_b]);
        }
        Ok(())
    }

    /// Overwrites with the whole patch at `position`, without growing.
    pub fn overwrite(&mut self, patch: &AudioClip, position: i64) -> Result<()> {
        self.overwrite_range(patch, position, 0, None, false)
    }

    pub fn concatenate(clips: &[AudioClip]) -> Result<AudioClip> {
        let first = clips
            .first()
            .ok_or_else(|| Error::InvalidArgument("nothing to concatenate".into()))?;
        if clips.iter().any(|clip| clip.channels() != first.channels()) {
            return Err(Error::InvalidArgument(
                "all clips must have the same channel count".into(),
            ));
        }
        if clips.iter().any(|clip| clip.frame_rate != first.frame_rate) {
            return Err(Error::InvalidArgument(
                "all clips must have the same frame rate".into(),
            ));
        }
        let mut channels = vec![Vec::new(); first.channels()];
        for clip in clips {
            for (buffer, channel) in channels.iter_mut().zip(&clip.channels) {
                buffer.extend_from_slice(channel);
            }
        }
        Ok(AudioClip {
            channels,
            frame_rate: first.frame_rate,
        })
    }

    pub fn stereo_from_mono(left: &AudioClip, right: &AudioClip) -> Result<AudioClip> {
        if left.channels() != 1 || right.channels() != 1 {
            return Err(Error::InvalidArgument("both clips must be mono".into()));
        }
        if left.frame_rate != right.frame_rate {
            return Err(Error::InvalidArgument("frame rates must match".into()));
        }
        AudioClip::from_channels(
            vec![left.channels[0].clone(), right.channels[0].clone()],
            left.frame_rate,
        )
    }

    pub fn load_wav(path: impl AsRef<Path>) -> Result<AudioClip> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)
            .map_err(|err| Error::InvalidArgument(format!("{}: {err}", path.display())))?;
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|err| Error::InvalidArgument(format!("{}: {err}", path.display())))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|err| Error::InvalidArgument(format!("{}: {err}", path.display())))?
            }
        };
        AudioClip::from_interleaved(&samples, spec.channels as usize, spec.sample_rate as f64)
    }

    pub fn save_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let spec = hound::WavSpec {
            channels: self.channels() as u16,
            sample_rate: self.frame_rate as u32,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|err| Error::InvalidArgument(format!("{}: {err}", path.display())))?;
        for frame in 0..self.frames() {
            for channel in &self.channels {
                writer
                    .write_sample(channel[frame])
                    .map_err(|err| Error::InvalidArgument(format!("{}: {err}", path.display())))?;
            }
        }
        writer
            .finalize()
            .map_err(|err| Error::InvalidArgument(format!("{}: {err}", path.display())))?;
        Ok(())
    }
}

/// A captured audio block with the engine state it was recorded under,
/// delivered to the input-chunk callback on the pump.
#[derive(Debug, Clone)]
pub struct InputAudioChunk {
    pub audio: AudioClip,
    pub playspec_id: u64,
    pub starting_frame: i64,
    pub was_transport_rolling: bool,
    pub wall_time: SystemTime,
}

impl InputAudioChunk {
    pub fn frames(&self) -> usize {
        self.audio.frames()
    }
}
