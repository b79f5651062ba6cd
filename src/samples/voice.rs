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

//! Tracking of the voices started for each key.

use std::collections::HashMap;

use slotmap::SlotMap;
use tracing::trace;

use crate::notes::KeyId;

slotmap::new_key_type! {
    /// Identifies one voice for its whole life, from note-on until the mixer
    /// reports its end.
    pub struct VoiceId;
}

/// Where a voice is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    /// The key that started the voice is still held.
    Held,
    /// The voice is fading out and will end on its own.
    Releasing,
}

/// One playback instance of a key's sample.
#[derive(Clone, Debug)]
pub struct Voice {
    key: KeyId,
    state: VoiceState,
    /// Context frame the voice started at.
    started_at: u64,
}

impl Voice {
    pub fn key(&self) -> KeyId {
        self.key
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }
}

/// Owns every voice that is still sounding, plus the list of held voices per
/// key. A key may have several held voices at once.
#[derive(Debug, Default)]
pub struct VoiceRegistry {
    voices: SlotMap<VoiceId, Voice>,
    held: HashMap<KeyId, Vec<VoiceId>>,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new held voice for `key` and appends it to the key's list.
    pub fn allocate(&mut self, key: KeyId, started_at: u64) -> VoiceId {
        let id = self.voices.insert(Voice {
            key,
            state: VoiceState::Held,
            started_at,
        });
        self.held.entry(key).or_default().push(id);
        id
    }

    /// Moves every held voice of `key` to releasing and clears the key's list.
    /// Returns the voices that were released, oldest first.
    pub fn release_key(&mut self, key: KeyId) -> Vec<VoiceId> {
        let released = self.held.remove(&key).unwrap_or_default();
        for id in released.iter() {
            if let Some(voice) = self.voices.get_mut(*id) {
                voice.state = VoiceState::Releasing;
            }
        }
        released
    }

    /// Forgets a voice. Unknown IDs are ignored; a voice is only removed once.
    pub fn remove(&mut self, id: VoiceId) -> Option<Voice> {
        let voice = self.voices.remove(id)?;
        if voice.state == VoiceState::Held {
            if let Some(list) = self.held.get_mut(&voice.key) {
                list.retain(|held| *held != id);
                if list.is_empty() {
                    self.held.remove(&voice.key);
                }
            }
        }
        trace!(key = %voice.key, state = ?voice.state, "Voice removed");
        Some(voice)
    }

    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(id)
    }

    /// The voices still held for `key`, oldest first.
    pub fn held_voices(&self, key: KeyId) -> &[VoiceId] {
        self.held.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of voices of `key` still sounding, held or releasing.
    pub fn sounding_voices(&self, key: KeyId) -> usize {
        self.voices.values().filter(|voice| voice.key == key).count()
    }

    /// Number of voices still sounding across all keys.
    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Forgets every voice.
    pub fn clear(&mut self) {
        self.voices.clear();
        self.held.clear();
    }
}
