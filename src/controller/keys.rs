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

//! The key-event state machine.
//!
//! A key is either released or pressed. Membership in the pressed set is the
//! only record of a key being down; auto-repeat and duplicate key-downs never
//! start another note.

use std::collections::BTreeSet;

use tracing::trace;

use crate::notes::{KeyId, NoteMap};

/// Receives note transitions from the state machine.
pub trait NoteSink {
    fn note_on(&mut self, key: KeyId);
    fn note_off(&mut self, key: KeyId);
}

/// What a key event did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Pressed(KeyId),
    Released(KeyId),
    /// Unmapped keys, repeats, duplicate key-downs and key-ups of keys that
    /// were not down.
    Ignored,
}

/// Tracks which mapped keys are held and drives note-on/note-off.
#[derive(Debug)]
pub struct KeyStateMachine {
    notes: NoteMap,
    pressed: BTreeSet<KeyId>,
}

impl KeyStateMachine {
    pub fn new(notes: NoteMap) -> Self {
        Self {
            notes,
            pressed: BTreeSet::new(),
        }
    }

    /// Handles a host key-down.
    pub fn key_down<S: NoteSink + ?Sized>(&mut self, key: &str, repeat: bool, sink: &mut S) -> KeyAction {
        let Some(key) = self.mapped(key) else {
            return KeyAction::Ignored;
        };
        if repeat || self.pressed.contains(&key) {
            trace!(key = %key, repeat, "Suppressed key down");
            return KeyAction::Ignored;
        }

        self.pressed.insert(key);
        sink.note_on(key);
        KeyAction::Pressed(key)
    }

    /// Handles a host key-up.
    pub fn key_up<S: NoteSink + ?Sized>(&mut self, key: &str, sink: &mut S) -> KeyAction {
        let Some(key) = self.mapped(key) else {
            return KeyAction::Ignored;
        };
        if !self.pressed.remove(&key) {
            return KeyAction::Ignored;
        }

        sink.note_off(key);
        KeyAction::Released(key)
    }

    /// Releases every pressed key, in key order.
    pub fn release_all<S: NoteSink + ?Sized>(&mut self, sink: &mut S) -> Vec<KeyId> {
        let released: Vec<KeyId> = std::mem::take(&mut self.pressed).into_iter().collect();
        for key in released.iter() {
            sink.note_off(*key);
        }
        released
    }

    pub fn is_pressed(&self, key: KeyId) -> bool {
        self.pressed.contains(&key)
    }

    /// The pressed keys, in key order.
    pub fn pressed(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.pressed.iter().copied()
    }

    pub fn notes(&self) -> &NoteMap {
        &self.notes
    }

    fn mapped(&self, key: &str) -> Option<KeyId> {
        KeyId::from_key(key).filter(|key| self.notes.contains(*key))
    }
}
