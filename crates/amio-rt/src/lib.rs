//! Real-time primitives shared across the AMIO substrate.

pub mod logring;
pub mod process;
pub mod ring;
pub mod transport;

pub use logring::{log_lane, LogDrain, RtLogWriter};
pub use process::{CallbackHandle, RtProcessor, StereoBuffers};
pub use ring::{spsc_channel, QueueError, RingReceiver, RingSender};
pub use transport::Transport;
