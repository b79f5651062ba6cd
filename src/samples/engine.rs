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

//! Starts and releases voices for keys.
//!
//! Every voice gets its own gain stage on the render side. Note-off fades all
//! voices held for the key toward a near-silent floor and stops them at the
//! end of the fade; the mixer reports the end and the voice is forgotten.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::voice::{VoiceId, VoiceRegistry};
use super::SampleSet;
use crate::audio::mixer::VoiceSource;
use crate::audio::{AudioContext, ContextState};
use crate::controller::keys::NoteSink;
use crate::notes::KeyId;

/// Level and timing applied to every voice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackSettings {
    /// Gain a voice starts at.
    pub gain: f32,
    /// How far into the sample playback starts, skipping its leading silence.
    pub start_offset: Duration,
    /// Length of the fade after note-off.
    pub release: Duration,
    /// Level the fade ramps toward. Exponential ramps cannot reach zero.
    pub release_floor: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            gain: 0.5,
            start_offset: Duration::from_millis(100),
            release: Duration::from_millis(100),
            release_floor: 0.001,
        }
    }
}

/// The note-voice engine.
pub struct SampleEngine {
    context: Arc<AudioContext>,
    samples: SampleSet,
    registry: VoiceRegistry,
    settings: PlaybackSettings,
}

impl SampleEngine {
    /// Creates an engine with no samples; every note is silent until
    /// [`SampleEngine::set_samples`] is called.
    pub fn new(context: Arc<AudioContext>, settings: PlaybackSettings) -> Self {
        Self {
            context,
            samples: SampleSet::new(),
            registry: VoiceRegistry::new(),
            settings,
        }
    }

    pub fn set_samples(&mut self, samples: SampleSet) {
        self.samples = samples;
    }

    pub fn samples(&self) -> &SampleSet {
        &self.samples
    }

    pub fn context(&self) -> &Arc<AudioContext> {
        &self.context
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Starts a new voice for `key`. Keys without a sample and a closed context
    /// are ignored. A voice that cannot be scheduled is abandoned.
    pub fn note_on(&mut self, key: KeyId) {
        if self.context.state() == ContextState::Closed {
            debug!(key = %key, "Ignoring note on, audio context closed");
            return;
        }
        let Some(buffer) = self.samples.get(key) else {
            trace!(key = %key, "No sample for key");
            return;
        };

        let now = self.context.current_frame();
        let offset = buffer.frames_for(self.settings.start_offset);
        let id = self.registry.allocate(key, now);
        let voice = VoiceSource::new(id, buffer.clone(), now, offset, self.settings.gain);

        match self.context.start(voice) {
            Ok(()) => debug!(key = %key, frame = now, "Voice started"),
            Err(e) => {
                warn!(key = %key, err = %e, "Unable to start voice");
                self.registry.remove(id);
            }
        }
    }

    /// Fades out every voice held for `key`. Does nothing if none are held.
    pub fn note_off(&mut self, key: KeyId) {
        let released = self.registry.release_key(key);
        if released.is_empty() {
            return;
        }

        let now = self.context.current_frame();
        let frames = self.context.frames_for(self.settings.release);
        for id in released {
            if let Err(e) = self
                .context
                .release(id, now, frames, self.settings.release_floor)
            {
                warn!(key = %key, err = %e, "Unable to release voice");
                self.registry.remove(id);
            }
        }
        debug!(key = %key, frame = now, "Voices released");
    }

    /// Called when the render side reports that a voice stopped sounding.
    pub fn voice_ended(&mut self, id: VoiceId) {
        if let Some(voice) = self.registry.remove(id) {
            let frames = self
                .context
                .current_frame()
                .saturating_sub(voice.started_at());
            trace!(key = %voice.key(), frames, "Voice ended");
        }
    }

    /// Cuts every voice and forgets them all.
    pub fn stop_all(&mut self) {
        self.registry.clear();
        if let Err(e) = self.context.stop_all() {
            debug!(err = %e, "Unable to stop voices");
        }
    }

    /// Voices still held for `key`.
    pub fn held_voices(&self, key: KeyId) -> usize {
        self.registry.held_voices(key).len()
    }

    /// Voices of `key` still sounding, including those fading out.
    pub fn sounding_voices(&self, key: KeyId) -> usize {
        self.registry.sounding_voices(key)
    }

    pub fn active_voice_count(&self) -> usize {
        self.registry.active_count()
    }

    pub fn held_voice_ids(&self, key: KeyId) -> &[VoiceId] {
        self.registry.held_voices(key)
    }
}

impl NoteSink for SampleEngine {
    fn note_on(&mut self, key: KeyId) {
        SampleEngine::note_on(self, key)
    }

    fn note_off(&mut self, key: KeyId) {
        SampleEngine::note_off(self, key)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::audio::{mock, EndedReceiver};
    use crate::samples::SampleBuffer;

    fn key(k: &str) -> KeyId {
        KeyId::from_key(k).unwrap()
    }

    /// A running mock context and an engine with one-second samples for q, w
    /// and e.
    fn engine() -> (SampleEngine, EndedReceiver) {
        let (context, ended) = mock::open("mock").unwrap();
        context.resume().unwrap();

        let mut samples = SampleSet::new();
        for k in ["q", "w", "e"] {
            samples.insert(
                key(k),
                SampleBuffer::new(vec![1.0; 44100], 1, context.sample_rate()),
            );
        }
        let mut engine = SampleEngine::new(context, PlaybackSettings::default());
        engine.set_samples(samples);
        (engine, ended)
    }

    /// Renders audio and hands every end report to the engine.
    fn render(engine: &mut SampleEngine, ended: &mut EndedReceiver, frames: usize) -> Vec<f32> {
        let output = engine.context().render_offline(frames).unwrap();
        while let Ok(id) = ended.try_recv() {
            engine.voice_ended(id);
        }
        output
    }

    #[test]
    #[serial]
    fn test_note_on_starts_voice_at_nominal_gain() {
        let (mut engine, mut ended) = engine();
        engine.note_on(key("q"));
        assert_eq!(engine.held_voices(key("q")), 1);

        let output = render(&mut engine, &mut ended, 64);
        assert!((output[0] - 0.5).abs() < 1e-6);
        assert!((output[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    #[serial]
    fn test_note_off_is_idempotent() {
        let (mut engine, mut ended) = engine();
        engine.note_on(key("q"));
        render(&mut engine, &mut ended, 64);

        engine.note_off(key("q"));
        engine.note_off(key("q"));
        assert_eq!(engine.held_voices(key("q")), 0);
        assert_eq!(engine.sounding_voices(key("q")), 1);

        // Note off for a key that never sounded does nothing.
        engine.note_off(key("w"));
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[test]
    #[serial]
    fn test_release_fades_and_voice_ends() {
        let (mut engine, mut ended) = engine();
        engine.note_on(key("q"));
        render(&mut engine, &mut ended, 441);

        engine.note_off(key("q"));
        let output = render(&mut engine, &mut ended, 4410);
        let frames = output.len() / 2;
        assert!((output[0] - 0.5).abs() < 1e-3);
        assert!(output[2 * (frames - 1)] < 0.01);
        assert_eq!(engine.active_voice_count(), 0);

        let output = render(&mut engine, &mut ended, 64);
        assert!(output.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    #[serial]
    fn test_keys_sound_independently() {
        let (mut engine, mut ended) = engine();
        engine.note_on(key("q"));
        engine.note_on(key("w"));
        render(&mut engine, &mut ended, 64);

        engine.note_off(key("q"));
        assert_eq!(engine.held_voices(key("q")), 0);
        assert_eq!(engine.held_voices(key("w")), 1);

        render(&mut engine, &mut ended, 44100 / 5);
        assert_eq!(engine.sounding_voices(key("q")), 0);
        assert_eq!(engine.sounding_voices(key("w")), 1);
    }

    #[test]
    #[serial]
    fn test_rapid_repress_overlaps_voices() {
        let (mut engine, mut ended) = engine();
        engine.note_on(key("q"));
        render(&mut engine, &mut ended, 64);
        engine.note_off(key("q"));
        engine.note_on(key("q"));
        render(&mut engine, &mut ended, 64);

        let new_voice = engine.held_voice_ids(key("q")).to_vec();
        assert_eq!(new_voice.len(), 1);
        assert_eq!(engine.sounding_voices(key("q")), 2);

        // Once the first fade completes only the new voice is left.
        render(&mut engine, &mut ended, 44100 / 5);
        assert_eq!(engine.sounding_voices(key("q")), 1);
        assert_eq!(engine.held_voice_ids(key("q")), new_voice.as_slice());

        engine.note_off(key("q"));
        render(&mut engine, &mut ended, 44100 / 5);
        assert!(engine.held_voice_ids(key("q")).is_empty());
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    #[serial]
    fn test_second_release_while_first_fades() {
        let (mut engine, mut ended) = engine();
        engine.note_on(key("q"));
        render(&mut engine, &mut ended, 64);
        engine.note_off(key("q"));
        engine.note_on(key("q"));
        render(&mut engine, &mut ended, 64);

        engine.note_off(key("q"));
        assert!(engine.held_voice_ids(key("q")).is_empty());
        assert_eq!(engine.sounding_voices(key("q")), 2);

        let output = render(&mut engine, &mut ended, 44100 / 5);
        assert_eq!(engine.active_voice_count(), 0);
        assert_eq!(output[output.len() - 1], 0.0);
    }

    #[test]
    #[serial]
    fn test_missing_sample_is_silent_noop() {
        let (mut engine, mut ended) = engine();
        engine.note_on(key("r"));
        assert_eq!(engine.active_voice_count(), 0);

        let output = render(&mut engine, &mut ended, 64);
        assert!(output.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    #[serial]
    fn test_closed_context_ignores_notes() {
        let (mut engine, _ended) = engine();
        engine.context().close();

        engine.note_on(key("q"));
        assert_eq!(engine.active_voice_count(), 0);
        engine.note_off(key("q"));
        engine.stop_all();
    }

    #[test]
    #[serial]
    fn test_stop_all_forgets_voices() {
        let (mut engine, mut ended) = engine();
        engine.note_on(key("q"));
        engine.note_on(key("e"));
        engine.stop_all();
        assert_eq!(engine.active_voice_count(), 0);

        let output = render(&mut engine, &mut ended, 64);
        assert!(output.iter().all(|sample| *sample == 0.0));
    }
}
