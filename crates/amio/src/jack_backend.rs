//! JACK client backend: two capture ports, two playback ports, and a
//! process callback that hands planar buffers to the realtime mixer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use amio_rt::{CallbackHandle, StereoBuffers};

use crate::error::{Error, Result};
use crate::server::{AudioServer, ServerEvents};

struct Process {
    callback: CallbackHandle,
    in_l: jack::Port<jack::AudioIn>,
    in_r: jack::Port<jack::AudioIn>,
    out_l: jack::Port<jack::AudioOut>,
    out_r: jack::Port<jack::AudioOut>,
}

impl jack::ProcessHandler for Process {
    fn process(&mut self, _: &jack::Client, scope: &jack::ProcessScope) -> jack::Control {
        let frames = scope.n_frames() as usize;
        let in_l = self.in_l.as_slice(scope);
        let in_r = self.in_r.as_slice(scope);
        let mut io = StereoBuffers {
            in_l,
            in_r,
            out_l: self.out_l.as_mut_slice(scope),
            out_r: self.out_r.as_mut_slice(scope),
            frames,
        };
        self.callback.process(&mut io);
        jack::Control::Continue
    }
}

struct Notifications {
    frame_rate: f64,
    rate_fault: Arc<AtomicBool>,
}

impl jack::NotificationHandler for Notifications {
    fn sample_rate(&mut self, _: &jack::Client, rate: jack::Frames) -> jack::Control {
        if rate as f64 != self.frame_rate {
            self.rate_fault.store(true, Ordering::Relaxed);
        }
        jack::Control::Continue
    }
}

struct JackServer {
    frame_rate: f64,
    active: Option<jack::AsyncClient<Notifications, Process>>,
}

impl AudioServer for JackServer {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn close(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.deactivate();
        }
    }
}

impl Drop for JackServer {
    fn drop(&mut self) {
        self.close();
    }
}

pub fn connect<F>(client_name: &str, build: F, events: ServerEvents) -> Result<Box<dyn AudioServer>>
where
    F: FnOnce(f64) -> CallbackHandle,
{
    let (client, _status) = jack::Client::new(client_name, jack::ClientOptions::NO_START_SERVER)
        .map_err(|err| Error::DeviceUnavailable(err.to_string()))?;
    let frame_rate = client.sample_rate() as f64;

    let in_l = register_in(&client, "input_l")?;
    let in_r = register_in(&client, "input_r")?;
    let out_l = register_out(&client, "output_l")?;
    let out_r = register_out(&client, "output_r")?;

    let process = Process {
        callback: build(frame_rate),
        in_l,
        in_r,
        out_l,
        out_r,
    };
    let notifications = Notifications {
        frame_rate,
        rate_fault: events.rate_fault,
    };
    let active = client
        .activate_async(notifications, process)
        .map_err(|err| Error::DeviceUnavailable(err.to_string()))?;
    Ok(Box::new(JackServer {
        frame_rate,
        active: Some(active),
    }))
}

fn register_in(client: &jack::Client, name: &str) -> Result<jack::Port<jack::AudioIn>> {
    client
        .register_port(name, jack::AudioIn::default())
        .map_err(|err| Error::DeviceUnavailable(err.to_string()))
}

fn register_out(client: &jack::Client, name: &str) -> Result<jack::Port<jack::AudioOut>> {
    client
        .register_port(name, jack::AudioOut::default())
        .map_err(|err| Error::DeviceUnavailable(err.to_string()))
}
