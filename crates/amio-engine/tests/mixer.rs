use std::sync::Arc;

use amio_engine::{
    ClientMessage, ClipData, ClipPool, EngineConfig, EngineHandle, EngineMessage, ImmutableClip,
    MixerEngine, Playspec, PlayspecEntry, PlayspecId, PlayspecRequest,
};
use amio_rt::{RtProcessor, StereoBuffers};

// Matches the int16 quantization step with headroom to spare.
const TOLERANCE: f32 = 1.0 / 16_384.0;

fn engine() -> (MixerEngine, EngineHandle) {
    MixerEngine::new(48_000.0, EngineConfig::default())
}

fn run_block_with_input(
    mixer: &mut MixerEngine,
    in_l: &[f32],
    in_r: &[f32],
) -> (Vec<f32>, Vec<f32>) {
    let frames = in_l.len();
    assert_eq!(frames, in_r.len());
    let mut out_l = vec![0.0f32; frames];
    let mut out_r = vec![0.0f32; frames];
    {
        let mut io = StereoBuffers {
            in_l,
            in_r,
            out_l: &mut out_l,
            out_r: &mut out_r,
            frames,
        };
        mixer.process(&mut io);
    }
    (out_l, out_r)
}

fn run_block(mixer: &mut MixerEngine, frames: usize) -> (Vec<f32>, Vec<f32>) {
    run_block_with_input(mixer, &vec![0.0; frames], &vec![0.0; frames])
}

fn submit(handle: &mut EngineHandle, playspec: Arc<Playspec>, id: u64, insert_at: i64, start_from: i64) {
    handle
        .send(ClientMessage::SetPlayspec(PlayspecRequest {
            playspec,
            id: PlayspecId::from_raw(id),
            insert_at,
            start_from,
        }))
        .unwrap();
}

fn drain(handle: &mut EngineHandle) -> Vec<EngineMessage> {
    let mut messages = Vec::new();
    while let Some(message) = handle.try_recv() {
        messages.push(message);
    }
    messages
}

fn applied_ids(messages: &[EngineMessage]) -> Vec<u64> {
    messages
        .iter()
        .filter_map(|message| match message {
            EngineMessage::PlayspecApplied(id) => Some(id.raw()),
            _ => None,
        })
        .collect()
}

fn mono_clip(pool: &mut ClipPool, samples: &[f32]) -> ImmutableClip {
    pool.insert(ClipData::from_f32(samples, 1, 48_000.0).unwrap())
}

fn assert_region(samples: &[f32], range: std::ops::Range<usize>, expected: f32) {
    for (index, &sample) in samples[range.clone()].iter().enumerate() {
        assert!(
            (sample - expected).abs() <= TOLERANCE,
            "sample {} = {}, expected {}",
            range.start + index,
            sample,
            expected
        );
    }
}

#[test]
fn silence_with_empty_playspec() {
    let (mut mixer, mut handle) = engine();
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();
    submit(&mut handle, Playspec::empty(), 1, 0, 0);

    for _ in 0..10 {
        let (out_l, out_r) = run_block(&mut mixer, 128);
        assert!(out_l.iter().all(|&sample| sample == 0.0));
        assert!(out_r.iter().all(|&sample| sample == 0.0));
    }

    let transport = handle.transport();
    assert_eq!(transport.position(), 1_280);

    let messages = drain(&mut handle);
    assert_eq!(applied_ids(&messages), vec![1]);
    let mut chunk_frames = 0;
    let mut next_start = 0i64;
    for message in messages {
        if let EngineMessage::InputChunk(chunk) = message {
            assert!(chunk.samples().iter().all(|&sample| sample == 0.0));
            assert!(chunk.was_transport_rolling);
            assert_eq!(chunk.playspec_id.raw(), 1);
            assert_eq!(chunk.starting_frame, next_start);
            next_start += chunk.frames() as i64;
            chunk_frames += chunk.frames();
            handle.recycle_chunk(chunk);
        }
    }
    assert_eq!(chunk_frames, 1_280);
}

#[test]
fn single_shot_entry_with_gains() {
    let (mut mixer, mut handle) = engine();
    let mut pool = ClipPool::new();
    let clip = mono_clip(&mut pool, &[1.0; 100]);
    let entry = PlayspecEntry::new(clip, 0, 100, 50, 0, 0.5, 1.0).unwrap();
    submit(&mut handle, Playspec::new(vec![entry]), 1, 0, 0);
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();

    let (out_l, out_r) = run_block(&mut mixer, 256);
    assert_region(&out_l, 0..50, 0.0);
    assert_region(&out_l, 50..150, 0.5);
    assert_region(&out_l, 150..256, 0.0);
    assert_region(&out_r, 0..50, 0.0);
    assert_region(&out_r, 50..150, 1.0);
    assert_region(&out_r, 150..256, 0.0);
}

#[test]
fn repeating_entry_mixes_every_occurrence() {
    let (mut mixer, mut handle) = engine();
    let mut pool = ClipPool::new();
    let clip = mono_clip(&mut pool, &[1.0; 100]);
    let entry = PlayspecEntry::new(clip, 0, 100, 50, 200, 1.0, 1.0).unwrap();
    submit(&mut handle, Playspec::new(vec![entry]), 1, 0, 0);
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();

    let (out_l, out_r) = run_block(&mut mixer, 1_024);
    for frame in 0..1_024 {
        let occurrence = [50i64, 250, 450, 650, 850]
            .iter()
            .any(|&start| frame as i64 >= start && (frame as i64) < start + 100);
        let expected = if occurrence { 1.0 } else { 0.0 };
        assert!((out_l[frame] - expected).abs() <= TOLERANCE, "frame {frame}");
        assert!((out_r[frame] - expected).abs() <= TOLERANCE, "frame {frame}");
    }
}

#[test]
fn overlapping_entries_sum_without_clipping() {
    let (mut mixer, mut handle) = engine();
    let mut pool = ClipPool::new();
    let clip = mono_clip(&mut pool, &[1.0; 10]);
    let first = PlayspecEntry::new(clip.clone(), 0, 10, 0, 0, 0.75, 0.75).unwrap();
    let second = PlayspecEntry::new(clip, 0, 10, 0, 0, 0.75, 0.75).unwrap();
    submit(&mut handle, Playspec::new(vec![first, second]), 1, 0, 0);
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();

    let (out_l, out_r) = run_block(&mut mixer, 32);
    assert_region(&out_l, 0..10, 1.5);
    assert_region(&out_l, 10..32, 0.0);
    assert_region(&out_r, 0..10, 1.5);
    assert_region(&out_r, 10..32, 0.0);
}

#[test]
fn stereo_clip_routes_channels_separately() {
    let (mut mixer, mut handle) = engine();
    let mut pool = ClipPool::new();
    // Interleaved L/R: left at 0.5, right at -0.25.
    let samples: Vec<f32> = (0..20)
        .map(|index| if index % 2 == 0 { 0.5 } else { -0.25 })
        .collect();
    let clip = pool.insert(ClipData::from_f32(&samples, 2, 48_000.0).unwrap());
    let entry = PlayspecEntry::new(clip, 0, 10, 0, 0, 1.0, 2.0).unwrap();
    submit(&mut handle, Playspec::new(vec![entry]), 1, 0, 0);
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();

    let (out_l, out_r) = run_block(&mut mixer, 16);
    assert_region(&out_l, 0..10, 0.5);
    assert_region(&out_r, 0..10, -0.5);
    assert_region(&out_l, 10..16, 0.0);
    assert_region(&out_r, 10..16, 0.0);
}

#[test]
fn negative_play_at_plays_the_tail() {
    let (mut mixer, mut handle) = engine();
    let mut pool = ClipPool::new();
    let samples: Vec<f32> = (0..100).map(|index| index as f32 / 100.0).collect();
    let clip = mono_clip(&mut pool, &samples);
    let entry = PlayspecEntry::new(clip, 0, 100, -30, 0, 1.0, 1.0).unwrap();
    submit(&mut handle, Playspec::new(vec![entry]), 1, 0, 0);
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();

    let (out_l, _) = run_block(&mut mixer, 128);
    // Frame 0 of the block is frame 30 of the clip.
    for frame in 0..70 {
        let expected = (frame + 30) as f32 / 100.0;
        assert!((out_l[frame] - expected).abs() <= TOLERANCE, "frame {frame}");
    }
    assert_region(&out_l, 70..128, 0.0);
}

#[test]
fn stopped_transport_mixes_nothing_and_holds_position() {
    let (mut mixer, mut handle) = engine();
    let mut pool = ClipPool::new();
    let clip = mono_clip(&mut pool, &[1.0; 100]);
    let entry = PlayspecEntry::new(clip, 0, 100, 0, 0, 1.0, 1.0).unwrap();
    submit(&mut handle, Playspec::new(vec![entry]), 1, 0, 0);

    for _ in 0..3 {
        let (out_l, out_r) = run_block(&mut mixer, 128);
        assert!(out_l.iter().all(|&sample| sample == 0.0));
        assert!(out_r.iter().all(|&sample| sample == 0.0));
    }
    assert_eq!(handle.transport().position(), 0);

    let messages = drain(&mut handle);
    // The swap still happened: the playspec applies immediately while stopped.
    assert_eq!(applied_ids(&messages), vec![1]);
    for message in &messages {
        if let EngineMessage::InputChunk(chunk) = message {
            assert!(!chunk.was_transport_rolling);
            assert_eq!(chunk.starting_frame, 0);
        }
    }
}

#[test]
fn playspec_swap_acknowledges_in_order_and_retires_the_old() {
    let (mut mixer, mut handle) = engine();
    let first = Playspec::empty();
    let second = Playspec::empty();
    let first_ptr = Arc::as_ptr(&first);

    submit(&mut handle, first, 1, 0, 0);
    run_block(&mut mixer, 128);
    submit(&mut handle, second, 2, 0, 0);
    run_block(&mut mixer, 128);

    let messages = drain(&mut handle);
    assert_eq!(applied_ids(&messages), vec![1, 2]);
    let retired: Vec<_> = messages
        .iter()
        .filter_map(|message| match message {
            EngineMessage::PlayspecRetired(playspec) => Some(Arc::as_ptr(playspec)),
            _ => None,
        })
        .collect();
    assert_eq!(retired, vec![first_ptr]);
}

#[test]
fn staged_playspec_replaced_before_pickup_is_never_applied() {
    let (mut mixer, mut handle) = engine();
    submit(&mut handle, Playspec::empty(), 1, 0, 0);
    submit(&mut handle, Playspec::empty(), 2, 0, 0);
    run_block(&mut mixer, 128);

    let messages = drain(&mut handle);
    assert_eq!(applied_ids(&messages), vec![2]);
    assert_eq!(mixer.current_playspec_id().raw(), 2);
}

#[test]
fn insert_at_waits_for_the_containing_block() {
    let (mut mixer, mut handle) = engine();
    let mut pool = ClipPool::new();
    let clip = mono_clip(&mut pool, &[1.0; 100]);
    let entry = PlayspecEntry::new(clip, 0, 100, 300, 0, 1.0, 1.0).unwrap();
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();
    run_block(&mut mixer, 128);
    submit(&mut handle, Playspec::new(vec![entry]), 1, 300, 300);

    // Covers [128, 256): 300 is beyond this block, nothing mixed yet.
    let (out_l, _) = run_block(&mut mixer, 128);
    assert!(out_l.iter().all(|&sample| sample == 0.0));
    assert!(applied_ids(&drain(&mut handle)).is_empty());

    // Covers [256, 384): contains 300, so the swap lands here and the
    // playhead moves to start_from before mixing.
    let (out_l, _) = run_block(&mut mixer, 128);
    assert!(applied_ids(&drain(&mut handle)) == vec![1]);
    // The block now spans [300, 428); the entry starts at its first frame.
    assert_region(&out_l, 0..100, 1.0);
    assert_region(&out_l, 100..128, 0.0);
    assert_eq!(handle.transport().position(), 428);
}

#[test]
fn start_from_overrides_set_position_in_the_same_cycle() {
    let (mut mixer, mut handle) = engine();
    handle.send(ClientMessage::SetPosition(777)).unwrap();
    submit(&mut handle, Playspec::empty(), 1, 0, 100);
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();
    run_block(&mut mixer, 128);
    assert_eq!(handle.transport().position(), 228);
}

#[test]
fn transport_ops_are_idempotent() {
    let (mut mixer, mut handle) = engine();
    handle.send(ClientMessage::SetPosition(500)).unwrap();
    handle.send(ClientMessage::SetPosition(500)).unwrap();
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();
    run_block(&mut mixer, 128);
    assert_eq!(handle.transport().position(), 628);
    assert!(handle.transport().is_rolling());
}

#[test]
fn clip_destruction_waits_for_the_playspec() {
    let (mut mixer, mut handle) = engine();
    let mut pool = ClipPool::new();
    let clip = mono_clip(&mut pool, &[1.0; 10]);
    let clip_id = clip.id();
    let entry = PlayspecEntry::new(clip, 0, 10, 0, 0, 1.0, 1.0).unwrap();
    submit(&mut handle, Playspec::new(vec![entry]), 1, 0, 0);
    run_block(&mut mixer, 128);

    handle.send(ClientMessage::DestroyClip(clip_id)).unwrap();
    for _ in 0..3 {
        run_block(&mut mixer, 128);
    }
    let destroyed = drain(&mut handle).iter().any(|message| {
        matches!(message, EngineMessage::ClipDestroyed(id) if *id == clip_id)
    });
    assert!(!destroyed, "clip acknowledged while still referenced");

    // Swap in a playspec that no longer references the clip.
    submit(&mut handle, Playspec::empty(), 2, 0, 0);
    run_block(&mut mixer, 128);
    let destroyed = drain(&mut handle).iter().any(|message| {
        matches!(message, EngineMessage::ClipDestroyed(id) if *id == clip_id)
    });
    assert!(destroyed);
    pool.finalize(clip_id);
    assert!(pool.is_empty());
}

#[test]
fn oversized_blocks_are_split_into_chunks() {
    let (mut mixer, mut handle) = engine();
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();
    let input: Vec<f32> = (0..300).map(|index| index as f32 / 300.0).collect();
    run_block_with_input(&mut mixer, &input, &input);

    let mut starts = Vec::new();
    let mut frames = Vec::new();
    for message in drain(&mut handle) {
        if let EngineMessage::InputChunk(chunk) = message {
            starts.push(chunk.starting_frame);
            frames.push(chunk.frames());
            // Interleaved payload reproduces the planar input.
            let base = chunk.starting_frame as usize;
            for (frame, pair) in chunk.samples().chunks_exact(2).enumerate() {
                assert_eq!(pair[0], input[base + frame]);
                assert_eq!(pair[1], input[base + frame]);
            }
            handle.recycle_chunk(chunk);
        }
    }
    assert_eq!(starts, vec![0, 128, 256]);
    assert_eq!(frames, vec![128, 128, 44]);
}

#[test]
fn exhausted_chunk_pool_drops_and_counts() {
    let config = EngineConfig {
        chunk_pool_depth: 2,
        ..EngineConfig::default()
    };
    let (mut mixer, mut handle) = MixerEngine::new(48_000.0, config);
    handle
        .send(ClientMessage::SetTransportRolling(true))
        .unwrap();
    // Four chunks needed, two records available, nothing recycled.
    for _ in 0..4 {
        run_block(&mut mixer, 128);
    }
    assert_eq!(handle.stats().dropped_chunks, 2);
    let delivered = drain(&mut handle)
        .into_iter()
        .filter(|message| matches!(message, EngineMessage::InputChunk(_)))
        .count();
    assert_eq!(delivered, 2);
}
