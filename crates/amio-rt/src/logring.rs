//! Byte-oriented log lane from the audio thread to the control thread.
//!
//! The audio thread formats diagnostics into a fixed-size stack buffer and
//! publishes whole `\n`-terminated lines. The control thread drains the lane,
//! reassembles lines across reads, and keeps any trailing fragment until the
//! rest of the line arrives.

use core::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arrayvec::ArrayString;
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// Upper bound for a single log line, including the trailing newline.
pub const MAX_LINE_BYTES: usize = 256;

/// Writer half, owned by the audio thread. Never blocks or allocates; lines
/// that do not fit in the ring are dropped and counted.
pub struct RtLogWriter {
    tx: HeapProducer<u8>,
    dropped: Arc<AtomicU64>,
}

/// Reader half, owned by the control thread.
pub struct LogDrain {
    rx: HeapConsumer<u8>,
    pending: Vec<u8>,
    dropped: Arc<AtomicU64>,
}

pub fn log_lane(capacity_bytes: usize) -> (RtLogWriter, LogDrain) {
    let (tx, rx) = HeapRb::new(capacity_bytes).split();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        RtLogWriter {
            tx,
            dropped: dropped.clone(),
        },
        LogDrain {
            rx,
            pending: Vec::new(),
            dropped,
        },
    )
}

impl RtLogWriter {
    /// Publishes one formatted line. Oversized lines are truncated to
    /// [`MAX_LINE_BYTES`]; lines are dropped whole when the ring is full.
    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        let mut buf: ArrayString<MAX_LINE_BYTES> = ArrayString::new();
        let _ = buf.write_fmt(args);
        if buf.try_push('\n').is_err() {
            buf.pop();
            let _ = buf.try_push('\n');
        }
        if self.tx.free_len() < buf.len() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.tx.push_slice(buf.as_bytes());
    }

    pub fn dropped_lines(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl LogDrain {
    /// Pops all available bytes and invokes `f` once per complete line,
    /// newline excluded. Partial trailing fragments are kept for the next
    /// drain; invalid UTF-8 is replaced lossily.
    pub fn drain(&mut self, mut f: impl FnMut(&str)) {
        let mut chunk = [0u8; 512];
        loop {
            let read = self.rx.pop_slice(&mut chunk);
            if read == 0 {
                break;
            }
            self.pending.extend_from_slice(&chunk[..read]);
        }
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            f(&String::from_utf8_lossy(&line[..line.len() - 1]));
        }
    }

    pub fn dropped_lines(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
