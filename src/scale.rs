//! Equal-temperament frequency table for the 88 keys of a piano.

use std::ops::RangeInclusive;

use crate::error::ScaleError;

/// Lowest key on the keyboard (A0).
pub const MIN_NOTE: u8 = 21;

/// Highest key on the keyboard (C8).
pub const MAX_NOTE: u8 = 108;

/// Keys covered by the table.
pub const KEYBOARD: RangeInclusive<u8> = MIN_NOTE..=MAX_NOTE;

/// Frequency of A0 in Hz.
pub const A0_HZ: f64 = 27.5;

const NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// One key of the keyboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    /// Name such as `A4` or `C5#`.
    pub name: String,
    /// Fundamental frequency in Hz.
    pub frequency: f64,
}

/// Maps MIDI note numbers to fundamental frequencies.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    keys: Vec<Key>,
}

impl FrequencyTable {
    /// Builds the equal-temperament table anchored at A0 = 27.5 Hz.
    ///
    /// Each semitone is the previous one times the twelfth root of two. The octave factor is applied as
    /// an exact power of two, so every A lands exactly on its nominal frequency (A4 is 440 Hz).
    pub fn equal_temperament() -> Self {
        let semitone = 2f64.powf(1.0 / 12.0);
        let keys = KEYBOARD
            .map(|note| {
                let offset = i32::from(note - MIN_NOTE);
                let (octaves, steps) = (offset / 12, offset % 12);
                let frequency = A0_HZ * 2f64.powi(octaves) * semitone.powi(steps);
                Key {
                    name: key_name(note),
                    frequency,
                }
            })
            .collect();
        Self { keys }
    }

    /// Fundamental frequency of `note`.
    pub fn lookup(&self, note: u8) -> Result<f64, ScaleError> {
        self.key(note).map(|key| key.frequency)
    }

    /// Name and frequency of `note`.
    pub fn key(&self, note: u8) -> Result<&Key, ScaleError> {
        if !KEYBOARD.contains(&note) {
            return Err(ScaleError::OutOfRange {
                note,
                min: MIN_NOTE,
                max: MAX_NOTE,
            });
        }
        Ok(&self.keys[usize::from(note - MIN_NOTE)])
    }

    /// Every key with its MIDI note number, from A0 up.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Key)> {
        KEYBOARD.zip(self.keys.iter())
    }
}

// A0 is key 0; octave numbers change at C, so A, A# and B belong to the octave below.
fn key_name(note: u8) -> String {
    let offset = usize::from(note - MIN_NOTE);
    let name = NAMES[offset % 12];
    let octave = (offset + 9) / 12;
    match name.strip_suffix('#') {
        Some(letter) => format!("{letter}{octave}#"),
        None => format!("{name}{octave}"),
    }
}
