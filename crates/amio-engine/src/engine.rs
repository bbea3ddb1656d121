//! The realtime mixer and its control-side handle.
//!
//! [`MixerEngine`] is the audio-callback body. Per block it drains a bounded
//! number of client messages, swaps in a staged playspec when its insertion
//! point falls inside the block, mixes every intersecting clip occurrence
//! into the output, captures the input into pooled chunks, advances the
//! transport, and acknowledges playspec swaps and clip destructions.
//!
//! Everything on this path is allocation-free and non-blocking. Overflow is
//! handled by dropping (chunks, log lines) or by bounded retry sets that are
//! flushed on later blocks (acknowledgements, retired playspecs).

use std::sync::Arc;
use std::time::SystemTime;

use amio_rt::logring::{log_lane, LogDrain, RtLogWriter};
use amio_rt::ring::{spsc_channel, RingReceiver, RingSender};
use amio_rt::{RtProcessor, StereoBuffers, Transport};

use crate::chunk::{chunk_pool, InputChunk, INPUT_CHUNK_FRAMES};
use crate::clip::{ClipId, I16_SCALE};
use crate::msg::{ClientMessage, EngineMessage, PlayspecRequest};
use crate::playspec::{Playspec, PlayspecEntry, PlayspecId};
use crate::stats::{EngineStats, StatsSnapshot};

use core::sync::atomic::Ordering;

const MAX_PENDING_DESTROY: usize = 64;
const MAX_RETIRED: usize = 8;
const MAX_APPLIED: usize = 8;

/// Queue capacities and per-block limits.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub client_queue_capacity: usize,
    pub engine_queue_capacity: usize,
    pub chunk_pool_depth: usize,
    pub log_capacity: usize,
    /// Upper bound on client messages applied per block, to keep the
    /// callback's worst case bounded.
    pub max_messages_per_block: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client_queue_capacity: 256,
            engine_queue_capacity: 1024,
            chunk_pool_depth: 64,
            log_capacity: 64 * 1024,
            max_messages_per_block: 32,
        }
    }
}

/// Control-side end of the engine queues.
pub struct EngineHandle {
    client_tx: RingSender<ClientMessage>,
    engine_rx: RingReceiver<EngineMessage>,
    free_chunks_tx: RingSender<Box<InputChunk>>,
    log_drain: LogDrain,
    transport: Arc<Transport>,
    stats: Arc<EngineStats>,
}

impl EngineHandle {
    /// Posts a message to the audio thread. Returns the message back when
    /// the queue is full so the caller can retry on the next pump cycle.
    pub fn send(&mut self, message: ClientMessage) -> Result<(), ClientMessage> {
        self.client_tx.try_send(message)
    }

    pub fn try_recv(&mut self) -> Option<EngineMessage> {
        self.engine_rx.try_recv().ok()
    }

    /// Returns a consumed capture record to the free-ring.
    pub fn recycle_chunk(&mut self, chunk: Box<InputChunk>) {
        let _ = self.free_chunks_tx.try_send(chunk);
    }

    pub fn drain_logs(&mut self, f: impl FnMut(&str)) {
        self.log_drain.drain(f);
    }

    pub fn transport(&self) -> Arc<Transport> {
        self.transport.clone()
    }

    pub fn frame_rate(&self) -> f64 {
        self.transport.frame_rate()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// The audio-callback body. Owned and driven by the audio thread.
pub struct MixerEngine {
    client_rx: RingReceiver<ClientMessage>,
    engine_tx: RingSender<EngineMessage>,
    free_chunks_rx: RingReceiver<Box<InputChunk>>,
    log: RtLogWriter,
    transport: Arc<Transport>,
    stats: Arc<EngineStats>,
    current: Option<Arc<Playspec>>,
    current_id: PlayspecId,
    staged: Option<PlayspecRequest>,
    applied_to_emit: heapless::Vec<PlayspecId, MAX_APPLIED>,
    retired: heapless::Vec<Arc<Playspec>, MAX_RETIRED>,
    pending_destroy: heapless::Vec<ClipId, MAX_PENDING_DESTROY>,
    max_messages_per_block: usize,
}

impl MixerEngine {
    /// Builds the engine pair: the realtime mixer and the control handle
    /// connected to it. All queue memory is allocated here, on the calling
    /// (control) thread.
    pub fn new(frame_rate: f64, config: EngineConfig) -> (MixerEngine, EngineHandle) {
        let (client_tx, client_rx) = spsc_channel(config.client_queue_capacity);
        let (engine_tx, engine_rx) = spsc_channel(config.engine_queue_capacity);
        let (free_chunks_tx, free_chunks_rx) = chunk_pool(config.chunk_pool_depth);
        let (log, log_drain) = log_lane(config.log_capacity);
        let transport = Arc::new(Transport::new(frame_rate));
        let stats = Arc::new(EngineStats::default());
        let mixer = MixerEngine {
            client_rx,
            engine_tx,
            free_chunks_rx,
            log,
            transport: transport.clone(),
            stats: stats.clone(),
            current: None,
            current_id: PlayspecId::NONE,
            staged: None,
            applied_to_emit: heapless::Vec::new(),
            retired: heapless::Vec::new(),
            pending_destroy: heapless::Vec::new(),
            max_messages_per_block: config.max_messages_per_block,
        };
        let handle = EngineHandle {
            client_tx,
            engine_rx,
            free_chunks_tx,
            log_drain,
            transport,
            stats,
        };
        (mixer, handle)
    }

    pub fn current_playspec_id(&self) -> PlayspecId {
        self.current_id
    }

    fn drain_client_messages(&mut self) {
        for _ in 0..self.max_messages_per_block {
            let message = match self.client_rx.try_recv() {
                Ok(message) => message,
                Err(_) => break,
            };
            match message {
                ClientMessage::SetTransportRolling(rolling) => {
                    self.transport.set_rolling(rolling);
                }
                ClientMessage::SetPosition(position) => {
                    self.transport.set_position(position);
                }
                ClientMessage::SetPlayspec(request) => {
                    if let Some(previous) = self.staged.replace(request) {
                        // Replaced before pickup; no applied ack for it.
                        self.retire(previous.playspec);
                    }
                }
                ClientMessage::DestroyClip(id) => {
                    if self.pending_destroy.push(id).is_err() {
                        self.stats.dropped_messages.fetch_add(1, Ordering::Relaxed);
                        self.log
                            .line(format_args!("destroy request for clip {id} dropped"));
                    }
                }
            }
        }
    }

    fn maybe_swap_playspec(&mut self, nframes: usize) {
        let rolling = self.transport.is_rolling();
        let window_end = self.transport.position() + nframes as i64;
        let due = self
            .staged
            .as_ref()
            .map_or(false, |request| !rolling || request.insert_at < window_end);
        if !due {
            return;
        }
        if let Some(request) = self.staged.take() {
            let old = self.current.replace(request.playspec);
            self.current_id = request.id;
            self.transport.set_position(request.start_from);
            if let Some(old) = old {
                self.retire(old);
            }
            if self.applied_to_emit.push(request.id).is_err() {
                self.stats.dropped_messages.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn retire(&mut self, playspec: Arc<Playspec>) {
        if self.retired.push(playspec).is_err() {
            // Chute full: the rejected playspec frees on the audio thread.
            self.stats.rt_frees.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn mix(&self, t0: i64, io: &mut StereoBuffers<'_>) {
        let playspec = match self.current.as_ref() {
            Some(playspec) => playspec,
            None => return,
        };
        let window_end = t0 + io.frames as i64;
        for entry in playspec.entries() {
            for start in entry.occurrences(t0, window_end) {
                render_occurrence(entry, start, t0, io);
            }
        }
    }

    fn capture(&mut self, t0: i64, rolling: bool, in_l: &[f32], in_r: &[f32]) {
        let frames = in_l.len().min(in_r.len());
        let mut offset = 0usize;
        while offset < frames {
            let segment = (frames - offset).min(INPUT_CHUNK_FRAMES);
            if self.engine_tx.slots() == 0 {
                self.stats.dropped_chunks.fetch_add(1, Ordering::Relaxed);
                offset += segment;
                continue;
            }
            let mut chunk = match self.free_chunks_rx.try_recv() {
                Ok(chunk) => chunk,
                Err(_) => {
                    self.stats.dropped_chunks.fetch_add(1, Ordering::Relaxed);
                    offset += segment;
                    continue;
                }
            };
            chunk.fill(&in_l[offset..offset + segment], &in_r[offset..offset + segment]);
            chunk.playspec_id = self.current_id;
            chunk.starting_frame = t0 + offset as i64;
            chunk.was_transport_rolling = rolling;
            chunk.wall_time = SystemTime::now();
            if self
                .engine_tx
                .try_send(EngineMessage::InputChunk(chunk))
                .is_err()
            {
                self.stats.dropped_chunks.fetch_add(1, Ordering::Relaxed);
                self.stats.rt_frees.fetch_add(1, Ordering::Relaxed);
            }
            offset += segment;
        }
    }

    fn references_clip(&self, id: ClipId) -> bool {
        let in_current = self
            .current
            .as_ref()
            .map_or(false, |playspec| playspec.references_clip(id));
        let in_staged = self
            .staged
            .as_ref()
            .map_or(false, |request| request.playspec.references_clip(id));
        in_current || in_staged
    }

    fn flush_destroyed_clips(&mut self) {
        let mut index = 0;
        while index < self.pending_destroy.len() {
            let id = self.pending_destroy[index];
            if self.references_clip(id) {
                index += 1;
                continue;
            }
            if self
                .engine_tx
                .try_send(EngineMessage::ClipDestroyed(id))
                .is_err()
            {
                break;
            }
            self.pending_destroy.swap_remove(index);
        }
    }

    fn flush_acknowledgements(&mut self) {
        while !self.applied_to_emit.is_empty() {
            let id = self.applied_to_emit[0];
            if self
                .engine_tx
                .try_send(EngineMessage::PlayspecApplied(id))
                .is_err()
            {
                break;
            }
            self.applied_to_emit.remove(0);
        }
        while let Some(playspec) = self.retired.pop() {
            if let Err(message) = self.engine_tx.try_send(EngineMessage::PlayspecRetired(playspec))
            {
                if let EngineMessage::PlayspecRetired(playspec) = message {
                    let _ = self.retired.push(playspec);
                }
                break;
            }
        }
    }
}

impl RtProcessor for MixerEngine {
    fn process(&mut self, io: &mut StereoBuffers<'_>) {
        self.drain_client_messages();
        self.maybe_swap_playspec(io.frames);
        io.silence();
        let t0 = self.transport.position();
        let rolling = self.transport.is_rolling();
        if rolling {
            self.mix(t0, io);
        }
        let (in_l, in_r) = (io.in_l, io.in_r);
        self.capture(t0, rolling, in_l, in_r);
        if rolling {
            self.transport.advance(io.frames as u64);
        }
        self.flush_destroyed_clips();
        self.flush_acknowledgements();
        self.stats.blocks.fetch_add(1, Ordering::Relaxed);
    }
}

fn render_occurrence(entry: &PlayspecEntry, start: i64, t0: i64, io: &mut StereoBuffers<'_>) {
    let region = entry.region_frames() as i64;
    let window_end = t0 + io.frames as i64;
    let begin = start.max(t0);
    let end = (start + region).min(window_end);
    if end <= begin {
        return;
    }
    let clip = entry.clip();
    let channels = clip.channels();
    let samples = clip.samples();
    let clip_offset = entry.frame_a() + (begin - start) as usize;
    let out_offset = (begin - t0) as usize;
    let count = (end - begin) as usize;
    let gain_l = entry.gain_l();
    let gain_r = entry.gain_r();
    for i in 0..count {
        let frame = clip_offset + i;
        let (left, right) = if channels == 1 {
            let sample = samples[frame];
            (sample, sample)
        } else {
            (samples[frame * channels], samples[frame * channels + 1])
        };
        io.out_l[out_offset + i] += left as f32 / I16_SCALE * gain_l;
        io.out_r[out_offset + i] += right as f32 / I16_SCALE * gain_r;
    }
}
