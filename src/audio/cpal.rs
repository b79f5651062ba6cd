// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, span, Level};

use super::mixer::Mixer;
use super::{AudioContext, AudioError, Backend, EndedReceiver, OutputFormat};
use crate::config::audio::DEFAULT_DEVICE;

/// Messages to the thread that owns the cpal stream. Play and Pause carry a
/// reply channel so errors reach the caller.
enum Control {
    Play(Sender<Result<(), AudioError>>),
    Pause(Sender<Result<(), AudioError>>),
    Close,
}

/// A cpal output stream, owned by its own thread since streams are not Send
/// on every host.
struct CpalBackend {
    name: String,
    control: Sender<Control>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CpalBackend {
    fn request(&self, control: fn(Sender<Result<(), AudioError>>) -> Control) -> Result<(), AudioError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.control
            .send(control(reply_tx))
            .map_err(|_| AudioError::Disconnected)?;
        reply_rx.recv().map_err(|_| AudioError::Disconnected)?
    }
}

impl Backend for CpalBackend {
    fn resume(&mut self) -> Result<(), AudioError> {
        self.request(Control::Play)
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.request(Control::Pause)
    }

    fn close(&mut self) {
        let _ = self.control.send(Control::Close);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(device = self.name, "Output thread panicked");
            }
        }
    }
}

/// Lists the names of every output device across the available hosts.
pub fn list_devices() -> Result<Vec<String>, AudioError> {
    let mut names = Vec::new();
    for host_id in cpal::available_hosts() {
        let host = cpal::host_from_id(host_id).map_err(|e| AudioError::Backend(e.to_string()))?;
        let devices = match host.output_devices() {
            Ok(devices) => devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in devices {
            match device.name() {
                Ok(name) => names.push(name),
                Err(e) => debug!(err = e.to_string(), "Skipping unnamed device"),
            }
        }
    }

    names.sort();
    names.dedup();
    Ok(names)
}

/// Finds an output device by name on the default host. "default" selects the
/// host's default output.
fn find_device(name: &str) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    if name == DEFAULT_DEVICE {
        return host.default_output_device().ok_or(AudioError::NoDefaultDevice);
    }

    let devices = host
        .output_devices()
        .map_err(|e| AudioError::Backend(e.to_string()))?;
    for device in devices {
        if device.name().map(|n| n.trim() == name).unwrap_or(false) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(name.to_string()))
}

/// Opens an audio context on the named cpal device, using the device's
/// default output configuration. The stream is built paused.
pub fn open(name: &str) -> Result<(Arc<AudioContext>, EndedReceiver), AudioError> {
    let device = find_device(name)?;
    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::Backend(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.config();
    let format = OutputFormat {
        channels: config.channels,
        sample_rate: config.sample_rate.0,
    };

    AudioContext::with_backend(name, format, move |mixer| {
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let device_name = name.to_string();

        let thread = thread::spawn(move || {
            let span = span!(Level::INFO, "audio output (cpal)");
            let _enter = span.enter();

            let stream = match build_stream(&device, &config, sample_format, mixer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            // Some hosts start a stream as soon as it is built.
            if let Err(e) = stream.pause() {
                debug!(err = e.to_string(), "Unable to pause new stream");
            }
            let _ = ready_tx.send(Ok(()));

            run_control_loop(&stream, control_rx);
            info!(device = device_name, "Output stream closed");
        });

        ready_rx.recv().map_err(|_| AudioError::Disconnected)??;
        Ok(Box::new(CpalBackend {
            name: name.to_string(),
            control: control_tx,
            thread: Some(thread),
        }) as Box<dyn Backend>)
    })
}

fn run_control_loop(stream: &cpal::Stream, control_rx: Receiver<Control>) {
    // A dropped sender means the context went away without closing.
    while let Ok(control) = control_rx.recv() {
        match control {
            Control::Play(reply) => {
                let _ = reply.send(stream.play().map_err(|e| AudioError::Backend(e.to_string())));
            }
            Control::Pause(reply) => {
                let _ = reply.send(stream.pause().map_err(|e| AudioError::Backend(e.to_string())));
            }
            Control::Close => break,
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Mixer,
) -> Result<cpal::Stream, AudioError> {
    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            let mut mixer = mixer;
            device.build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| mixer.render(data),
                |err| error!("CPAL output stream error: {}", err),
                None,
            )
        }
        cpal::SampleFormat::I16 => build_converting_stream::<i16>(device, config, mixer),
        cpal::SampleFormat::I32 => build_converting_stream::<i32>(device, config, mixer),
        cpal::SampleFormat::U16 => build_converting_stream::<u16>(device, config, mixer),
        other => return Err(AudioError::UnsupportedFormat(other.to_string())),
    };

    stream.map_err(|e| AudioError::Backend(e.to_string()))
}

/// Builds a stream for an integer sample format: the mixer renders into a
/// scratch buffer that is converted into the device buffer.
fn build_converting_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.render(&mut scratch);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}
