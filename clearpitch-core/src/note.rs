//! # Musical Note Conversions
//!
//! Equal-temperament conversions between frequency, MIDI note number, note
//! name, and cents, plus a statically computed note table covering the
//! tuner's supported range (A0 to C8) for nearest-note lookups.

use once_cell::sync::Lazy;

/// Reference pitch for A4 in Hz.
pub const A4_HZ: f32 = 440.0;

/// MIDI note number of A4.
pub const A4_MIDI: i32 = 69;

/// Lowest note in the supported range (A0).
pub const MIDI_MIN: i32 = 21;

/// Highest note in the supported range (C8).
pub const MIDI_MAX: i32 = 108;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A single musical note with its name and equal-temperament frequency.
#[derive(Debug, Clone)]
pub struct Note {
    pub name: String,
    pub midi: i32,
    pub frequency: f32,
}

/// Statically computed notes for the supported range (A0 to C8).
///
/// Computed once at startup; used for nearest-note lookups and display.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    (MIDI_MIN..=MIDI_MAX)
        .map(|midi| Note {
            name: midi_to_note_name(midi),
            midi,
            frequency: midi_to_freq(midi),
        })
        .collect()
});

/// Converts a frequency to the nearest MIDI note number.
pub fn freq_to_midi(freq_hz: f32) -> i32 {
    (12.0 * (freq_hz / A4_HZ).log2() + A4_MIDI as f32).round() as i32
}

/// Equal-temperament frequency of a MIDI note number.
pub fn midi_to_freq(midi: i32) -> f32 {
    A4_HZ * 2.0_f32.powf((midi - A4_MIDI) as f32 / 12.0)
}

/// Signed cents offset of a frequency from a MIDI note.
///
/// Positive values are sharp, negative flat. Not wrapped; callers that need
/// the offset relative to the *nearest* semitone apply [`wrap_cents`].
pub fn cents_off_from_midi(freq_hz: f32, midi: i32) -> f32 {
    1200.0 * (freq_hz / midi_to_freq(midi)).log2()
}

/// Wraps a cents value into `[-50, 50)`, the offset from the nearest
/// semitone. Periodic with period 100 for any input.
pub fn wrap_cents(cents: f32) -> f32 {
    (cents + 50.0).rem_euclid(100.0) - 50.0
}

/// Note name with MIDI-convention octave (`octave = midi/12 - 1`), so
/// MIDI 69 is "A4" and MIDI 60 is "C4".
pub fn midi_to_note_name(midi: i32) -> String {
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Finds the closest note in the supported table to a given frequency.
pub fn find_nearest_note(freq_hz: f32) -> &'static Note {
    NOTES
        .iter()
        .min_by(|a, b| {
            let da = (a.frequency - freq_hz).abs();
            let db = (b.frequency - freq_hz).abs();
            da.partial_cmp(&db).unwrap()
        })
        .unwrap() // NOTES is never empty.
}
