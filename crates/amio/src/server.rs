//! Seam between the facade and the audio server driving the callback.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use amio_rt::CallbackHandle;

use crate::error::Result;

/// A live audio-server connection. The stream is running on return from
/// [`connect`] and keeps running until [`AudioServer::close`].
pub trait AudioServer: Send {
    fn frame_rate(&self) -> f64;
    fn close(&mut self);
}

/// Out-of-band conditions reported by the server backend.
pub struct ServerEvents {
    /// Raised when the server renegotiates the sample rate or shuts down;
    /// the facade refuses further operations once set.
    pub rate_fault: Arc<AtomicBool>,
}

/// Opens the audio-server connection under `client_name`. The `build`
/// closure receives the negotiated sample rate and returns the realtime
/// processor to drive.
#[cfg(feature = "jack")]
pub fn connect<F>(client_name: &str, build: F, events: ServerEvents) -> Result<Box<dyn AudioServer>>
where
    F: FnOnce(f64) -> CallbackHandle,
{
    crate::jack_backend::connect(client_name, build, events)
}

#[cfg(not(feature = "jack"))]
pub fn connect<F>(client_name: &str, build: F, events: ServerEvents) -> Result<Box<dyn AudioServer>>
where
    F: FnOnce(f64) -> CallbackHandle,
{
    let _ = (client_name, build, events);
    Err(crate::error::Error::DeviceUnavailable(
        "built without a JACK backend".into(),
    ))
}
