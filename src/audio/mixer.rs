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

//! Render-side voice mixing, independent of any audio backend.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use super::context::ContextState;
use super::gain::GainAutomation;
use super::OutputFormat;
use crate::samples::{SampleBuffer, VoiceId};

/// Instructions from the engine to the render side.
pub enum MixerCommand {
    /// Start a new voice.
    Start(VoiceSource),
    /// Fade a voice out from its current gain toward `floor` over `frames`,
    /// then stop it.
    Release {
        id: VoiceId,
        at: u64,
        frames: u64,
        floor: f32,
    },
    /// Stop a voice at the given frame without a fade.
    Stop { id: VoiceId, at: u64 },
    /// Stop every voice now.
    StopAll,
}

/// One playing sample: source position plus its own gain stage.
pub struct VoiceSource {
    id: VoiceId,
    buffer: Arc<SampleBuffer>,
    /// Next frame of the buffer to play.
    position: usize,
    /// Context frame the voice becomes audible at.
    start_at: u64,
    /// Context frame the voice is cut at, if scheduled.
    stop_at: Option<u64>,
    gain: GainAutomation,
}

impl VoiceSource {
    /// Creates a voice that plays `buffer` from `offset` frames in, at `gain`,
    /// starting at context frame `start_at`.
    pub fn new(
        id: VoiceId,
        buffer: Arc<SampleBuffer>,
        start_at: u64,
        offset: usize,
        gain: f32,
    ) -> Self {
        let mut automation = GainAutomation::new(gain);
        automation.set_value_at(start_at, gain);
        Self {
            id,
            buffer,
            position: offset,
            start_at,
            stop_at: None,
            gain: automation,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    fn schedule_stop(&mut self, at: u64) {
        self.stop_at = Some(self.stop_at.map_or(at, |existing| existing.min(at)));
    }

    fn release(&mut self, at: u64, frames: u64, floor: f32) {
        // The value must be read before cancelling, since cancelling drops the
        // events that produce it.
        let current = self.gain.value_at(at);
        self.gain.cancel_from(at);
        self.gain.set_value_at(at, current);
        if let Err(e) = self.gain.exponential_ramp_to(at + frames, floor) {
            warn!(error = %e, "Invalid release ramp, cutting voice");
            self.schedule_stop(at);
            return;
        }
        self.schedule_stop(at + frames);
    }

    /// Mixes this voice into `output` (interleaved, `channels` wide) starting at
    /// context frame `first_frame`. Returns false once the voice has ended.
    fn mix_into(&mut self, output: &mut [f32], channels: usize, first_frame: u64) -> bool {
        let source_channels = self.buffer.channel_count() as usize;
        let total_frames = self.buffer.frames();

        for (index, frame) in output.chunks_exact_mut(channels).enumerate() {
            let now = first_frame + index as u64;
            if now < self.start_at {
                continue;
            }
            if self.stop_at.is_some_and(|stop_at| now >= stop_at) || self.position >= total_frames {
                return false;
            }

            let gain = self.gain.value_at(now);
            for (channel, out) in frame.iter_mut().enumerate() {
                *out += self.buffer.sample(self.position, channel % source_channels) * gain;
            }
            self.position += 1;
        }

        let next = first_frame + (output.len() / channels) as u64;
        !(self.stop_at.is_some_and(|stop_at| next >= stop_at) || self.position >= total_frames)
    }
}

/// Mixes active voices into the output and keeps the context clock.
pub struct Mixer {
    format: OutputFormat,
    voices: Vec<VoiceSource>,
    commands: Receiver<MixerCommand>,
    ended: UnboundedSender<VoiceId>,
    clock: Arc<AtomicU64>,
    state: Arc<AtomicU8>,
}

impl Mixer {
    pub(super) fn new(
        format: OutputFormat,
        commands: Receiver<MixerCommand>,
        ended: UnboundedSender<VoiceId>,
        clock: Arc<AtomicU64>,
        state: Arc<AtomicU8>,
    ) -> Self {
        Self {
            format,
            voices: Vec::new(),
            commands,
            ended,
            clock,
            state,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Number of voices currently held by the render side.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Fills `output` with the next block of interleaved frames. While the
    /// context is not running the output is silent and the clock stands still.
    pub fn render(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        if ContextState::from(self.state.load(Ordering::Acquire)) != ContextState::Running {
            return;
        }

        self.drain_commands();

        let channels = self.format.channels as usize;
        let first_frame = self.clock.load(Ordering::Acquire);
        let mut finished = Vec::new();
        self.voices.retain_mut(|voice| {
            if voice.mix_into(output, channels, first_frame) {
                true
            } else {
                finished.push(voice.id);
                false
            }
        });

        for id in finished {
            self.notify_ended(id);
        }

        self.clock
            .store(first_frame + (output.len() / channels) as u64, Ordering::Release);
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                MixerCommand::Start(voice) => self.voices.push(voice),
                MixerCommand::Release {
                    id,
                    at,
                    frames,
                    floor,
                } => {
                    if let Some(voice) = self.voices.iter_mut().find(|voice| voice.id == id) {
                        voice.release(at, frames, floor);
                    }
                }
                MixerCommand::Stop { id, at } => {
                    if let Some(voice) = self.voices.iter_mut().find(|voice| voice.id == id) {
                        voice.schedule_stop(at);
                    }
                }
                MixerCommand::StopAll => {
                    let stopped: Vec<VoiceId> = self.voices.drain(..).map(|voice| voice.id).collect();
                    for id in stopped {
                        self.notify_ended(id);
                    }
                }
            }
        }
    }

    fn notify_ended(&self, id: VoiceId) {
        // The engine may already be gone during teardown.
        let _ = self.ended.send(id);
    }
}
