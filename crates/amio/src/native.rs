//! The native interface: the control-side state machine connected to a live
//! audio server, plus the pump thread that drains the engine queue.
//!
//! Threading: user operations and the pump both lock [`ControlState`]; user
//! callbacks are always invoked with the lock released so they may call back
//! into the facade.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use amio_engine::{
    ClientMessage, ClipData, EngineConfig, EngineHandle, EngineMessage, MixerEngine,
    PlayspecEntry as EngineEntry, PlayspecId, PlayspecRequest, StatsSnapshot,
};
use amio_engine::{ClipPool, Playspec as EnginePlayspec};
use amio_rt::{CallbackHandle, Transport};

use crate::audio_clip::{AudioClip, InputAudioChunk};
use crate::error::{Error, Result};
use crate::interface::{
    ClipSource, InputChunkCallback, Interface, Playspec, PlayspecResultCallback, ReleaseBox,
    UploadedClip,
};
use crate::server::{self, AudioServer, ServerEvents};

const PUMP_INTERVAL: Duration = Duration::from_millis(100);

pub struct NativeInterface {
    state: State,
}

enum State {
    Uninitialized,
    Running(Running),
    Closed,
}

struct Running {
    control: Arc<Mutex<ControlState>>,
    transport: Arc<Transport>,
    stop: Arc<AtomicBool>,
    pump: Option<thread::JoinHandle<()>>,
    server: Box<dyn AudioServer>,
    rate_fault: Arc<AtomicBool>,
}

impl NativeInterface {
    pub fn new() -> Self {
        Self {
            state: State::Uninitialized,
        }
    }

    /// Uploads a mutable clip, returning a shared immutable handle that can
    /// be referenced by any number of playspec entries.
    pub fn upload_clip(&mut self, clip: &AudioClip) -> Result<UploadedClip> {
        let running = self.running()?;
        running.control.lock().upload(clip)
    }

    /// Drop counters and block progress from the audio thread.
    pub fn engine_stats(&self) -> Result<StatsSnapshot> {
        let running = self.running()?;
        Ok(running.control.lock().handle.stats())
    }

    fn running(&self) -> Result<&Running> {
        match &self.state {
            State::Running(running) => {
                if running.rate_fault.load(Ordering::Relaxed) {
                    return Err(Error::DeviceUnavailable(
                        "audio server renegotiated the sample rate".into(),
                    ));
                }
                Ok(running)
            }
            _ => Err(Error::ClosedInterface),
        }
    }
}

impl Default for NativeInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeInterface {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Interface for NativeInterface {
    fn init(&mut self, client_name: &str) -> Result<()> {
        if !matches!(self.state, State::Uninitialized) {
            return Err(Error::AlreadyInitialized);
        }
        let rate_fault = Arc::new(AtomicBool::new(false));
        let mut engine_handle = None;
        let server = server::connect(
            client_name,
            |frame_rate| {
                let (mixer, handle) = MixerEngine::new(frame_rate, EngineConfig::default());
                engine_handle = Some(handle);
                CallbackHandle::new(Box::new(mixer))
            },
            ServerEvents {
                rate_fault: rate_fault.clone(),
            },
        )?;
        let handle = engine_handle.ok_or(Error::Bug("server backend did not build an engine"))?;
        let transport = handle.transport();
        let control = Arc::new(Mutex::new(ControlState::new(handle)));
        let stop = Arc::new(AtomicBool::new(false));
        let pump = {
            let control = control.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("amio-pump".into())
                .spawn(move || pump_loop(control, stop))
                .map_err(|err| {
                    Error::DeviceUnavailable(format!("failed to spawn pump thread: {err}"))
                })?
        };
        self.state = State::Running(Running {
            control,
            transport,
            stop,
            pump: Some(pump),
            server,
            rate_fault,
        });
        Ok(())
    }

    fn frame_rate(&self) -> Result<f64> {
        Ok(self.running()?.transport.frame_rate())
    }

    fn position(&self) -> Result<i64> {
        Ok(self.running()?.transport.position())
    }

    fn set_position(&mut self, position: i64) -> Result<()> {
        let running = self.running()?;
        running
            .control
            .lock()
            .post(ClientMessage::SetPosition(position));
        Ok(())
    }

    fn transport_rolling(&self) -> Result<bool> {
        Ok(self.running()?.transport.is_rolling())
    }

    fn set_transport_rolling(&mut self, rolling: bool) -> Result<()> {
        let running = self.running()?;
        running
            .control
            .lock()
            .post(ClientMessage::SetTransportRolling(rolling));
        Ok(())
    }

    fn schedule_playspec_change(
        &mut self,
        playspec: Playspec,
        insert_at: i64,
        start_from: i64,
        on_result: Option<PlayspecResultCallback>,
    ) -> Result<()> {
        let running = self.running()?;
        running
            .control
            .lock()
            .schedule(playspec, insert_at, start_from, on_result)
    }

    fn set_input_chunk_callback(&mut self, callback: Option<InputChunkCallback>) -> Result<()> {
        let running = self.running()?;
        running.control.lock().chunk_callback = callback;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Running(mut running) => {
                running.stop.store(true, Ordering::Relaxed);
                if let Some(pump) = running.pump.take() {
                    let _ = pump.join();
                }
                let callbacks = running.control.lock().take_unresolved_callbacks();
                for callback in callbacks {
                    callback(false);
                }
                running.server.close();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        !matches!(self.state, State::Running(_))
    }
}

struct PendingSubmission {
    id: PlayspecId,
    callback: Option<PlayspecResultCallback>,
}

/// Everything the pump and the user-facing operations share.
struct ControlState {
    handle: EngineHandle,
    pool: ClipPool,
    frame_rate: f64,
    releases: ReleaseBox,
    next_playspec_id: u64,
    /// Submission currently sitting in the client queue, if any.
    outstanding: Option<PlayspecId>,
    /// Submissions awaiting resolution, in id order.
    pending: Vec<PendingSubmission>,
    /// Requests waiting for the outstanding submission to be acknowledged.
    deferred: VecDeque<PlayspecRequest>,
    /// Messages bounced off a full client queue, retried every pump cycle.
    pending_io: VecDeque<ClientMessage>,
    chunk_callback: Option<InputChunkCallback>,
}

impl ControlState {
    fn new(handle: EngineHandle) -> Self {
        let frame_rate = handle.frame_rate();
        Self {
            handle,
            pool: ClipPool::new(),
            frame_rate,
            releases: Arc::new(Mutex::new(Vec::new())),
            next_playspec_id: 1,
            outstanding: None,
            pending: Vec::new(),
            deferred: VecDeque::new(),
            pending_io: VecDeque::new(),
            chunk_callback: None,
        }
    }

    fn upload(&mut self, clip: &AudioClip) -> Result<UploadedClip> {
        if clip.frame_rate() != self.frame_rate {
            return Err(Error::InvalidArgument(format!(
                "clip frame rate {} does not match the interface rate {}",
                clip.frame_rate(),
                self.frame_rate
            )));
        }
        let data = ClipData::from_i16(clip.interleaved_i16(), clip.channels(), clip.frame_rate())?;
        Ok(UploadedClip::new(
            self.pool.insert(data),
            self.releases.clone(),
        ))
    }

    fn schedule(
        &mut self,
        playspec: Playspec,
        insert_at: i64,
        start_from: i64,
        on_result: Option<PlayspecResultCallback>,
    ) -> Result<()> {
        let mut entries = Vec::with_capacity(playspec.entries.len());
        for entry in playspec.entries {
            let clip = match entry.clip {
                ClipSource::Uploaded(uploaded) => uploaded.engine_clip().clone(),
                ClipSource::Mutable(audio) => self.upload(&audio)?.engine_clip().clone(),
            };
            entries.push(EngineEntry::new(
                clip,
                entry.frame_a,
                entry.frame_b,
                entry.play_at_frame,
                entry.repeat_interval,
                entry.gain_l,
                entry.gain_r,
            )?);
        }
        let id = PlayspecId::from_raw(self.next_playspec_id);
        self.next_playspec_id += 1;
        self.pending.push(PendingSubmission {
            id,
            callback: on_result,
        });
        let request = PlayspecRequest {
            playspec: EnginePlayspec::new(entries),
            id,
            insert_at,
            start_from,
        };
        if self.outstanding.is_none() {
            self.outstanding = Some(id);
            self.post(ClientMessage::SetPlayspec(request));
        } else {
            self.deferred.push_back(request);
        }
        Ok(())
    }

    fn post(&mut self, message: ClientMessage) {
        if let Err(message) = self.handle.send(message) {
            self.pending_io.push_back(message);
        }
    }

    fn retry_pending_io(&mut self) {
        while let Some(message) = self.pending_io.pop_front() {
            if let Err(message) = self.handle.send(message) {
                self.pending_io.push_front(message);
                break;
            }
        }
    }

    /// One pump cycle's worth of bookkeeping. Callbacks to invoke are pushed
    /// onto `results` and `chunks` for the caller to run outside the lock.
    fn drain(
        &mut self,
        results: &mut Vec<(PlayspecResultCallback, bool)>,
        chunks: &mut Vec<InputAudioChunk>,
    ) {
        let released: Vec<_> = self.releases.lock().drain(..).collect();
        for id in released {
            self.post(ClientMessage::DestroyClip(id));
        }
        self.retry_pending_io();
        while let Some(message) = self.handle.try_recv() {
            match message {
                EngineMessage::PlayspecApplied(id) => self.on_applied(id, results),
                EngineMessage::PlayspecRetired(playspec) => drop(playspec),
                EngineMessage::ClipDestroyed(id) => self.pool.finalize(id),
                EngineMessage::InputChunk(chunk) => {
                    let mut left = Vec::with_capacity(chunk.frames());
                    let mut right = Vec::with_capacity(chunk.frames());
                    for pair in chunk.samples().chunks_exact(2) {
                        left.push(pair[0]);
                        right.push(pair[1]);
                    }
                    if let Ok(audio) = AudioClip::from_channels(vec![left, right], self.frame_rate)
                    {
                        chunks.push(InputAudioChunk {
                            audio,
                            playspec_id: chunk.playspec_id.raw(),
                            starting_frame: chunk.starting_frame,
                            was_transport_rolling: chunk.was_transport_rolling,
                            wall_time: chunk.wall_time,
                        });
                    }
                    self.handle.recycle_chunk(chunk);
                }
            }
        }
        self.handle
            .drain_logs(|line| log::debug!(target: "amio", "{line}"));
    }

    /// Resolves every pending submission overtaken by `applied`, then
    /// submits the newest deferred request; older deferred requests are
    /// superseded and resolve `false` once a later id is applied.
    fn on_applied(
        &mut self,
        applied: PlayspecId,
        results: &mut Vec<(PlayspecResultCallback, bool)>,
    ) {
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].id <= applied {
                let submission = self.pending.remove(index);
                if let Some(callback) = submission.callback {
                    results.push((callback, submission.id == applied));
                }
            } else {
                index += 1;
            }
        }
        if self.outstanding.map_or(false, |id| id <= applied) {
            self.outstanding = None;
        }
        if let Some(request) = self.deferred.pop_back() {
            self.deferred.clear();
            self.outstanding = Some(request.id);
            self.post(ClientMessage::SetPlayspec(request));
        }
    }

    fn take_unresolved_callbacks(&mut self) -> Vec<PlayspecResultCallback> {
        self.deferred.clear();
        self.outstanding = None;
        self.pending
            .drain(..)
            .filter_map(|submission| submission.callback)
            .collect()
    }
}

fn pump_loop(control: Arc<Mutex<ControlState>>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        pump_once(&control);
        thread::sleep(PUMP_INTERVAL);
    }
    // Best-effort final drain before teardown.
    pump_once(&control);
}

fn pump_once(control: &Mutex<ControlState>) {
    let mut results = Vec::new();
    let mut chunks = Vec::new();
    let mut chunk_callback = {
        let mut state = control.lock();
        state.drain(&mut results, &mut chunks);
        if chunks.is_empty() {
            None
        } else {
            state.chunk_callback.take()
        }
    };
    for (callback, applied) in results {
        callback(applied);
    }
    if let Some(callback) = chunk_callback.as_mut() {
        for chunk in chunks {
            callback(chunk);
        }
    }
    if let Some(callback) = chunk_callback {
        let mut state = control.lock();
        // A callback installed while this cycle ran takes precedence.
        if state.chunk_callback.is_none() {
            state.chunk_callback = Some(callback);
        }
    }
}
