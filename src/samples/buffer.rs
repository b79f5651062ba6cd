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

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::notes::{KeyId, NoteMap};

/// Decoded audio for one note, held entirely in memory.
#[derive(Clone, PartialEq)]
pub struct SampleBuffer {
    /// Interleaved samples.
    data: Vec<f32>,
    channel_count: u16,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        Self {
            data,
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// A silent buffer of the given length.
    pub fn silence(frames: usize, channel_count: u16, sample_rate: u32) -> Self {
        Self::new(
            vec![0.0; frames * channel_count.max(1) as usize],
            channel_count,
            sample_rate,
        )
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// The sample at `frame` on `channel`. Out of range reads are silent.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.data
            .get(frame * self.channel_count as usize + channel)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Converts a duration to a frame position within this buffer.
    pub fn frames_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// The loaded samples, keyed by the key that plays them. Keys whose sample
/// failed to load are absent.
#[derive(Clone, Debug, Default)]
pub struct SampleSet {
    buffers: HashMap<KeyId, Arc<SampleBuffer>>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: KeyId, buffer: SampleBuffer) {
        self.buffers.insert(key, Arc::new(buffer));
    }

    pub fn get(&self, key: KeyId) -> Option<&Arc<SampleBuffer>> {
        self.buffers.get(&key)
    }

    pub fn contains(&self, key: KeyId) -> bool {
        self.buffers.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Keys of the note map that have no sample, in keyboard order.
    pub fn missing(&self, notes: &NoteMap) -> Vec<KeyId> {
        notes
            .iter()
            .map(|(key, _)| *key)
            .filter(|key| !self.contains(*key))
            .collect()
    }

    /// Total memory held by the samples, in bytes.
    pub fn memory_size(&self) -> usize {
        self.buffers.values().map(|buffer| buffer.memory_size()).sum()
    }
}
