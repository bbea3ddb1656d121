//! AMIO
//! ====
//! Audio I/O and mixing substrate for multitrack recording and looping
//! hosts. The control side builds immutable playback schedules (playspecs)
//! and exchanges them with a hard-realtime mixer over lock-free queues; the
//! mixer sums scheduled clip regions into the output and streams captured
//! input back as tagged chunks.
//!
//! Entry points: [`NativeInterface`] for a live JACK connection,
//! [`NullInterface`] and [`DummyInterface`] for tests, or the
//! [`create_interface`] factory.

use std::time::SystemTime;

pub mod audio_clip;
pub mod dummy;
pub mod error;
pub mod fader;
pub mod interface;
pub mod native;
pub mod null;
mod server;

#[cfg(feature = "jack")]
mod jack_backend;

pub use audio_clip::{AudioClip, InputAudioChunk};
pub use dummy::DummyInterface;
pub use error::{Error, Result};
pub use fader::{db_to_factor, factor_to_db, Fader};
pub use interface::{
    ClipSource, InputChunkCallback, Interface, Playspec, PlayspecEntry, PlayspecResultCallback,
    UploadedClip,
};
pub use native::NativeInterface;
pub use null::{NullInterface, NULL_CHUNK_FRAMES};

/// Which audio I/O driver to construct.
pub enum Driver {
    /// The native interface; call [`Interface::init`] to connect.
    Jack,
    Null {
        frame_rate: f64,
        starting_time: Option<SystemTime>,
    },
    Dummy {
        frame_rate: f64,
    },
}

pub fn create_interface(driver: Driver) -> Box<dyn Interface> {
    match driver {
        Driver::Jack => Box::new(NativeInterface::new()),
        Driver::Null {
            frame_rate,
            starting_time,
        } => Box::new(match starting_time {
            Some(time) => NullInterface::with_starting_time(frame_rate, time),
            None => NullInterface::new(frame_rate),
        }),
        Driver::Dummy { frame_rate } => Box::new(DummyInterface::new(frame_rate)),
    }
}
