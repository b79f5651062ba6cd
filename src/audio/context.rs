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

//! The process-wide audio context: the output device, its clock and the
//! command path to the render side.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::mixer::{Mixer, MixerCommand, VoiceSource};
use super::{AudioError, Backend, EndedReceiver, OutputFormat};
use crate::samples::VoiceId;

/// Set while a context is open. Only one may exist per process.
static CONTEXT_OPEN: AtomicBool = AtomicBool::new(false);

/// Lifecycle of an audio context. Closed is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    Suspended = 0,
    Running = 1,
    Closed = 2,
}

impl From<u8> for ContextState {
    fn from(value: u8) -> Self {
        match value {
            0 => ContextState::Suspended,
            1 => ContextState::Running,
            _ => ContextState::Closed,
        }
    }
}

/// Holds the process-wide context slot; releasing it allows a new context.
struct ContextSlot;

impl ContextSlot {
    fn acquire() -> Result<ContextSlot, AudioError> {
        CONTEXT_OPEN
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ContextSlot)
            .map_err(|_| AudioError::AlreadyOpen)
    }
}

impl Drop for ContextSlot {
    fn drop(&mut self) {
        CONTEXT_OPEN.store(false, Ordering::Release);
    }
}

/// An open audio output. Starts suspended; see [`crate::audio::ActivationGate`].
pub struct AudioContext {
    /// The device name this context plays through.
    name: String,
    format: OutputFormat,
    /// Frames rendered so far. Advanced only by the render side.
    clock: Arc<AtomicU64>,
    state: Arc<AtomicU8>,
    commands: Sender<MixerCommand>,
    backend: Mutex<Box<dyn Backend>>,
    slot: Mutex<Option<ContextSlot>>,
}

impl AudioContext {
    /// Opens a context whose mixer is handed to `start` to build the backend.
    /// Fails if another context is open.
    pub(super) fn with_backend<F>(
        name: &str,
        format: OutputFormat,
        start: F,
    ) -> Result<(Arc<AudioContext>, EndedReceiver), AudioError>
    where
        F: FnOnce(Mixer) -> Result<Box<dyn Backend>, AudioError>,
    {
        let slot = ContextSlot::acquire()?;

        let (commands, commands_rx) = crossbeam_channel::unbounded();
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let clock = Arc::new(AtomicU64::new(0));
        let state = Arc::new(AtomicU8::new(ContextState::Suspended as u8));
        let mixer = Mixer::new(format, commands_rx, ended_tx, clock.clone(), state.clone());
        let backend = start(mixer)?;

        info!(
            device = name,
            channels = format.channels,
            sample_rate = format.sample_rate,
            "Audio context opened"
        );

        Ok((
            Arc::new(AudioContext {
                name: name.to_string(),
                format,
                clock,
                state,
                commands,
                backend: Mutex::new(backend),
                slot: Mutex::new(Some(slot)),
            }),
            ended_rx,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ContextState {
        ContextState::from(self.state.load(Ordering::Acquire))
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    /// The context clock in frames.
    pub fn current_frame(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    /// Converts a duration to a frame count at the context rate.
    pub fn frames_for(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.format.sample_rate as f64).round() as u64
    }

    /// Starts pulling audio. A no-op if already running.
    pub fn resume(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(AudioError::Closed),
            ContextState::Suspended => {
                self.backend.lock().resume()?;
                self.state
                    .store(ContextState::Running as u8, Ordering::Release);
                info!(device = %self.name, "Audio context running");
                Ok(())
            }
        }
    }

    /// Stops pulling audio until the next resume.
    pub fn suspend(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Suspended => Ok(()),
            ContextState::Closed => Err(AudioError::Closed),
            ContextState::Running => {
                self.backend.lock().suspend()?;
                self.state
                    .store(ContextState::Suspended as u8, Ordering::Release);
                debug!(device = %self.name, "Audio context suspended");
                Ok(())
            }
        }
    }

    /// Closes the device, dropping every voice, and frees the process-wide
    /// slot. The context cannot be resumed afterwards.
    pub fn close(&self) {
        if self.state() == ContextState::Closed {
            return;
        }

        let _ = self.commands.send(MixerCommand::StopAll);
        self.backend.lock().close();
        self.state
            .store(ContextState::Closed as u8, Ordering::Release);
        self.slot.lock().take();
        info!(device = %self.name, "Audio context closed");
    }

    /// Hands a new voice to the render side.
    pub fn start(&self, voice: VoiceSource) -> Result<(), AudioError> {
        self.send(MixerCommand::Start(voice))
    }

    /// Fades a voice from its current gain toward `floor` over `frames`,
    /// starting at frame `at`, and stops it at the end of the fade.
    pub fn release(&self, id: VoiceId, at: u64, frames: u64, floor: f32) -> Result<(), AudioError> {
        self.send(MixerCommand::Release {
            id,
            at,
            frames,
            floor,
        })
    }

    /// Stops a voice at frame `at` without a fade.
    pub fn stop(&self, id: VoiceId, at: u64) -> Result<(), AudioError> {
        self.send(MixerCommand::Stop { id, at })
    }

    /// Stops every voice.
    pub fn stop_all(&self) -> Result<(), AudioError> {
        self.send(MixerCommand::StopAll)
    }

    /// Renders frames on the calling thread, for devices without their own
    /// clock (the mock device).
    pub fn render_offline(&self, frames: usize) -> Result<Vec<f32>, AudioError> {
        if self.state() == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        self.backend.lock().render(frames).ok_or_else(|| {
            AudioError::Backend(format!("{} renders in real time", self.name))
        })
    }

    fn send(&self, command: MixerCommand) -> Result<(), AudioError> {
        if self.state() == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        self.commands
            .send(command)
            .map_err(|_| AudioError::Disconnected)
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioContext")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("state", &self.state())
            .field("current_frame", &self.current_frame())
            .finish()
    }
}
