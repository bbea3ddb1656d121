//! Immutable playback schedules.
//!
//! A playspec is a snapshot of what to play: an ordered list of entries, each
//! selecting a sample range of a clip, a transport frame at which the first
//! occurrence starts, an optional repeat stride, and per-channel gains.
//! Playspecs are built off the audio thread and swapped in wholesale.

use std::sync::Arc;

use crate::clip::{ClipId, ImmutableClip};

/// Identifier assigned on admission; strictly increasing per interface
/// instance. 0 is reserved for "no playspec".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayspecId(u64);

impl PlayspecId {
    pub const NONE: PlayspecId = PlayspecId(0);

    pub fn from_raw(raw: u64) -> Self {
        PlayspecId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlayspecError {
    #[error("entry range is reversed ({frame_a} > {frame_b})")]
    ReversedRange { frame_a: usize, frame_b: usize },
    #[error("entry range {frame_a}..{frame_b} exceeds clip length {frames}")]
    RangeOutOfBounds {
        frame_a: usize,
        frame_b: usize,
        frames: usize,
    },
    #[error("repeat interval must not be negative (got {0})")]
    NegativeRepeatInterval(i64),
}

/// One scheduled (possibly repeating) occurrence of a clip region.
#[derive(Debug, Clone)]
pub struct PlayspecEntry {
    clip: ImmutableClip,
    frame_a: usize,
    frame_b: usize,
    play_at_frame: i64,
    repeat_interval: i64,
    gain_l: f32,
    gain_r: f32,
}

impl PlayspecEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clip: ImmutableClip,
        frame_a: usize,
        frame_b: usize,
        play_at_frame: i64,
        repeat_interval: i64,
        gain_l: f32,
        gain_r: f32,
    ) -> Result<Self, PlayspecError> {
        if frame_a > frame_b {
            return Err(PlayspecError::ReversedRange { frame_a, frame_b });
        }
        if frame_b > clip.frames() {
            return Err(PlayspecError::RangeOutOfBounds {
                frame_a,
                frame_b,
                frames: clip.frames(),
            });
        }
        if repeat_interval < 0 {
            return Err(PlayspecError::NegativeRepeatInterval(repeat_interval));
        }
        Ok(Self {
            clip,
            frame_a,
            frame_b,
            play_at_frame,
            repeat_interval,
            gain_l,
            gain_r,
        })
    }

    pub fn clip(&self) -> &ImmutableClip {
        &self.clip
    }

    pub fn frame_a(&self) -> usize {
        self.frame_a
    }

    pub fn frame_b(&self) -> usize {
        self.frame_b
    }

    pub fn play_at_frame(&self) -> i64 {
        self.play_at_frame
    }

    pub fn repeat_interval(&self) -> i64 {
        self.repeat_interval
    }

    pub fn gain_l(&self) -> f32 {
        self.gain_l
    }

    pub fn gain_r(&self) -> f32 {
        self.gain_r
    }

    /// Length of the selected clip region in frames.
    pub fn region_frames(&self) -> usize {
        self.frame_b - self.frame_a
    }

    /// Iterates the occurrence start frames whose interval
    /// `[s, s + region_frames)` intersects `[window_start, window_end)`.
    /// Occurrences are `play_at_frame + k * repeat_interval` for `k >= 0`;
    /// a zero repeat interval means single-shot.
    pub fn occurrences(&self, window_start: i64, window_end: i64) -> Occurrences {
        let region = self.region_frames() as i64;
        if region == 0 || window_end <= window_start {
            return Occurrences::none();
        }
        let stride = self.repeat_interval;
        let first = if stride == 0 {
            if self.play_at_frame + region <= window_start {
                return Occurrences::none();
            }
            self.play_at_frame
        } else {
            // Smallest k >= 0 with play_at + k * stride + region > window_start.
            let deficit = window_start - self.play_at_frame - region + 1;
            let k = if deficit > 0 {
                (deficit + stride - 1).div_euclid(stride)
            } else {
                0
            };
            self.play_at_frame + k * stride
        };
        Occurrences {
            next_start: first,
            stride,
            window_end,
            done: false,
        }
    }
}

/// Allocation-free iterator over occurrence start frames.
#[derive(Debug, Clone)]
pub struct Occurrences {
    next_start: i64,
    stride: i64,
    window_end: i64,
    done: bool,
}

impl Occurrences {
    fn none() -> Self {
        Self {
            next_start: 0,
            stride: 0,
            window_end: 0,
            done: true,
        }
    }
}

impl Iterator for Occurrences {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.done || self.next_start >= self.window_end {
            return None;
        }
        let start = self.next_start;
        if self.stride == 0 {
            self.done = true;
        } else {
            self.next_start += self.stride;
        }
        Some(start)
    }
}

/// An ordered, immutable sequence of entries. Entries may overlap freely;
/// the mixer sums them.
#[derive(Debug, Default)]
pub struct Playspec {
    entries: Box<[PlayspecEntry]>,
}

impl Playspec {
    pub fn new(entries: Vec<PlayspecEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries: entries.into_boxed_slice(),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn entries(&self) -> &[PlayspecEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn references_clip(&self, id: ClipId) -> bool {
        self.entries.iter().any(|entry| entry.clip.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipData;
    use crate::pool::ClipPool;
    use proptest::prelude::*;

    fn test_clip(frames: usize) -> ImmutableClip {
        let mut pool = ClipPool::new();
        pool.insert(ClipData::from_i16(vec![0; frames], 1, 48_000.0).unwrap())
    }

    fn entry(frames: usize, play_at: i64, repeat: i64) -> PlayspecEntry {
        PlayspecEntry::new(test_clip(frames), 0, frames, play_at, repeat, 1.0, 1.0).unwrap()
    }

    #[test]
    fn range_validation() {
        let clip = test_clip(10);
        assert!(matches!(
            PlayspecEntry::new(clip.clone(), 5, 3, 0, 0, 1.0, 1.0),
            Err(PlayspecError::ReversedRange { .. })
        ));
        assert!(matches!(
            PlayspecEntry::new(clip.clone(), 0, 11, 0, 0, 1.0, 1.0),
            Err(PlayspecError::RangeOutOfBounds { .. })
        ));
        assert!(matches!(
            PlayspecEntry::new(clip, 0, 10, 0, -1, 1.0, 1.0),
            Err(PlayspecError::NegativeRepeatInterval(-1))
        ));
    }

    #[test]
    fn single_shot_occurrence_window() {
        let entry = entry(100, 50, 0);
        assert_eq!(entry.occurrences(0, 256).collect::<Vec<_>>(), vec![50]);
        // Tail still inside the window.
        assert_eq!(entry.occurrences(100, 149).collect::<Vec<_>>(), vec![50]);
        // Region ended exactly at the window start.
        assert!(entry.occurrences(150, 300).next().is_none());
        // Window ends before the occurrence begins.
        assert!(entry.occurrences(0, 50).next().is_none());
    }

    #[test]
    fn repeating_occurrences_cover_the_window() {
        let entry = entry(100, 50, 200);
        assert_eq!(
            entry.occurrences(0, 1024).collect::<Vec<_>>(),
            vec![50, 250, 450, 650, 850]
        );
        // A window in the middle skips the earlier occurrences.
        assert_eq!(
            entry.occurrences(400, 700).collect::<Vec<_>>(),
            vec![450, 650]
        );
    }

    #[test]
    fn negative_play_at_keeps_only_the_tail() {
        let entry1 = entry(100, -30, 0);
        assert_eq!(entry1.occurrences(0, 256).collect::<Vec<_>>(), vec![-30]);
        let entry2 = entry(100, -100, 0);
        assert!(entry2.occurrences(0, 256).next().is_none());
    }

    #[test]
    fn empty_region_contributes_nothing() {
        let clip = test_clip(10);
        let entry = PlayspecEntry::new(clip, 4, 4, 0, 100, 1.0, 1.0).unwrap();
        assert!(entry.occurrences(0, 1_000).next().is_none());
    }

    proptest! {
        #[test]
        fn occurrences_match_brute_force(
            frames in 1usize..64,
            play_at in -200i64..200,
            repeat in 0i64..50,
            window_start in -100i64..300,
            window in 1i64..200,
        ) {
            let entry = entry(frames, play_at, repeat);
            let window_end = window_start + window;
            let fast: Vec<i64> = entry.occurrences(window_start, window_end).collect();
            let region = frames as i64;
            let mut slow = Vec::new();
            for k in 0..2_000i64 {
                let start = play_at + k * repeat;
                if start + region > window_start && start < window_end {
                    slow.push(start);
                }
                if repeat == 0 || start >= window_end {
                    break;
                }
            }
            prop_assert_eq!(fast, slow);
        }
    }
}
