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

//! The fixed mapping from computer keys to piano notes.
//!
//! Two rows of the keyboard form the piano: the letter row (plus `[` and `]`)
//! holds the white keys and the number row above it the black keys, starting
//! at C4 on `q`.

use std::fmt;

/// A physical key, identified by its lowercased character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(char);

impl KeyId {
    /// Builds a key identifier from a host key string. Returns None unless the
    /// string is exactly one character (after lowercasing).
    pub fn from_key(key: &str) -> Option<KeyId> {
        let mut chars = key.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }

        let mut lower = c.to_lowercase();
        let lowered = lower.next()?;
        if lower.next().is_some() {
            return None;
        }
        Some(KeyId(lowered))
    }

    /// The character for this key.
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display grouping of a note on the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyColor {
    White,
    Black,
}

/// An immutable description of a note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteDescriptor {
    /// The pitch class, e.g. "C" or "F#".
    name: &'static str,
    /// The octave number.
    octave: u8,
    /// Nominal frequency in Hz. Reference only; samples are never pitch shifted.
    frequency: f32,
    /// Whether the note is drawn as a white or black key.
    color: KeyColor,
}

impl NoteDescriptor {
    const fn new(name: &'static str, octave: u8, frequency: f32, color: KeyColor) -> Self {
        Self {
            name,
            octave,
            frequency,
            color,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn octave(&self) -> u8 {
        self.octave
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn color(&self) -> KeyColor {
        self.color
    }

    /// The note name in a form safe for URLs and file names: sharps are
    /// written as "s", so "C#" becomes "Cs".
    pub fn file_name(&self) -> String {
        self.name.replace('#', "s")
    }
}

impl fmt::Display for NoteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}

use KeyColor::{Black, White};

const STANDARD_LAYOUT: [(KeyId, NoteDescriptor); 20] = [
    (KeyId('q'), NoteDescriptor::new("C", 4, 261.63, White)),
    (KeyId('2'), NoteDescriptor::new("C#", 4, 277.18, Black)),
    (KeyId('w'), NoteDescriptor::new("D", 4, 293.66, White)),
    (KeyId('3'), NoteDescriptor::new("D#", 4, 311.13, Black)),
    (KeyId('e'), NoteDescriptor::new("E", 4, 329.63, White)),
    (KeyId('r'), NoteDescriptor::new("F", 4, 349.23, White)),
    (KeyId('5'), NoteDescriptor::new("F#", 4, 369.99, Black)),
    (KeyId('t'), NoteDescriptor::new("G", 4, 392.00, White)),
    (KeyId('6'), NoteDescriptor::new("G#", 4, 415.30, Black)),
    (KeyId('y'), NoteDescriptor::new("A", 4, 440.00, White)),
    (KeyId('7'), NoteDescriptor::new("A#", 4, 466.16, Black)),
    (KeyId('u'), NoteDescriptor::new("B", 4, 493.88, White)),
    (KeyId('i'), NoteDescriptor::new("C", 5, 523.25, White)),
    (KeyId('9'), NoteDescriptor::new("C#", 5, 554.37, Black)),
    (KeyId('o'), NoteDescriptor::new("D", 5, 587.33, White)),
    (KeyId('0'), NoteDescriptor::new("D#", 5, 622.25, Black)),
    (KeyId('p'), NoteDescriptor::new("E", 5, 659.25, White)),
    (KeyId('['), NoteDescriptor::new("F", 5, 698.46, White)),
    (KeyId('='), NoteDescriptor::new("F#", 5, 739.99, Black)),
    (KeyId(']'), NoteDescriptor::new("G", 5, 783.99, White)),
];

/// Static lookup from key to note. Never mutated after startup.
#[derive(Clone, Copy, Debug)]
pub struct NoteMap {
    entries: &'static [(KeyId, NoteDescriptor)],
}

impl NoteMap {
    /// The standard two-row layout, C4 to G5.
    pub fn standard() -> NoteMap {
        NoteMap {
            entries: &STANDARD_LAYOUT,
        }
    }

    /// Looks up the note for a key.
    pub fn get(&self, key: KeyId) -> Option<&'static NoteDescriptor> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, note)| note)
    }

    pub fn contains(&self, key: KeyId) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over the mapping in keyboard order (ascending pitch).
    pub fn iter(&self) -> impl Iterator<Item = &'static (KeyId, NoteDescriptor)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_host_string() {
        assert_eq!(KeyId::from_key("q"), Some(KeyId('q')));
        assert_eq!(KeyId::from_key("Q"), Some(KeyId('q')));
        assert_eq!(KeyId::from_key("["), Some(KeyId('[')));
        assert_eq!(KeyId::from_key(""), None);
        assert_eq!(KeyId::from_key("Shift"), None);
        assert_eq!(KeyId::from_key("qq"), None);
    }

    #[test]
    fn test_standard_layout() {
        let notes = NoteMap::standard();
        assert_eq!(notes.len(), 20);

        let c4 = notes.get(KeyId('q')).unwrap();
        assert_eq!(c4.to_string(), "C4");
        assert_eq!(c4.color(), KeyColor::White);

        let fs5 = notes.get(KeyId('=')).unwrap();
        assert_eq!(fs5.to_string(), "F#5");
        assert_eq!(fs5.file_name(), "Fs");
        assert_eq!(fs5.color(), KeyColor::Black);

        assert_eq!(notes.get(KeyId('w')).unwrap().to_string(), "D4");
        assert!(notes.get(KeyId('z')).is_none());
    }

    #[test]
    fn test_layout_is_ascending_and_unique() {
        let notes = NoteMap::standard();
        let frequencies: Vec<f32> = notes.iter().map(|(_, note)| note.frequency()).collect();
        assert!(frequencies.windows(2).all(|pair| pair[0] < pair[1]));

        let mut keys: Vec<KeyId> = notes.iter().map(|(key, _)| *key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), notes.len());
    }
}
