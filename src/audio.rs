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

use tokio::sync::mpsc::UnboundedReceiver;

use crate::config;
use crate::samples::VoiceId;

pub mod activation;
pub mod context;
pub mod cpal;
pub mod gain;
pub mod mixer;
pub mod mock;

pub use activation::ActivationGate;
pub use context::{AudioContext, ContextState};

/// Receives the IDs of voices that stopped sounding, whether they ran out of
/// sample data or reached a scheduled stop.
pub type EndedReceiver = UnboundedReceiver<VoiceId>;

/// Errors from the audio output and its render side.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("an audio context is already open")]
    AlreadyOpen,

    #[error("the audio context is closed")]
    Closed,

    #[error("the render side of the audio context has gone away")]
    Disconnected,

    #[error("audio device '{0}' not found")]
    DeviceNotFound(String),

    #[error("no default output device available")]
    NoDefaultDevice,

    #[error("unsupported output sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio backend error: {0}")]
    Backend(String),
}

/// The channel layout and rate the render side produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

/// The device end of an audio context.
pub trait Backend: Send {
    /// Starts (or restarts) pulling audio from the mixer.
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Stops pulling audio; the context clock stands still while suspended.
    fn suspend(&mut self) -> Result<(), AudioError>;

    /// Releases the device. Called once.
    fn close(&mut self);

    /// Renders the given number of frames on the calling thread. Only devices
    /// without a real-time clock support this.
    fn render(&mut self, _frames: usize) -> Option<Vec<f32>> {
        None
    }
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, AudioError> {
    cpal::list_devices()
}

/// Opens the process-wide audio context on the configured device.
pub fn open(config: &config::Audio) -> Result<(Arc<AudioContext>, EndedReceiver), AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return mock::open(device);
    }

    cpal::open(device)
}
