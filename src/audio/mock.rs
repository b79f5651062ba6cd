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

use tracing::debug;

use super::mixer::Mixer;
use super::{AudioContext, AudioError, Backend, EndedReceiver, OutputFormat};

/// The format every mock device renders in.
pub const MOCK_FORMAT: OutputFormat = OutputFormat {
    channels: 2,
    sample_rate: 44100,
};

/// A mock device. Nothing is played; audio is rendered on demand through
/// [`AudioContext::render_offline`].
struct MockBackend {
    name: String,
    mixer: Mixer,
}

impl Backend for MockBackend {
    fn resume(&mut self) -> Result<(), AudioError> {
        debug!(device = self.name, "Mock device resumed");
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        debug!(device = self.name, "Mock device suspended");
        Ok(())
    }

    fn close(&mut self) {
        debug!(
            device = self.name,
            voices = self.mixer.voice_count(),
            "Mock device closed"
        );
    }

    fn render(&mut self, frames: usize) -> Option<Vec<f32>> {
        let mut output = vec![0.0; frames * self.mixer.format().channels as usize];
        self.mixer.render(&mut output);
        Some(output)
    }
}

/// Opens an audio context on the named mock device.
pub fn open(name: &str) -> Result<(Arc<AudioContext>, EndedReceiver), AudioError> {
    AudioContext::with_backend(name, MOCK_FORMAT, |mixer| {
        Ok(Box::new(MockBackend {
            name: name.to_string(),
            mixer,
        }))
    })
}
