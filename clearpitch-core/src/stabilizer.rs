//! # Pitch-to-Note Stabilizer
//!
//! Converts the noisy per-hop stream of pitch estimates into a musically
//! stable reading. Three layers of smoothing, cheapest first: a short
//! median filter over recent samples kills single-frame spikes, note-lock
//! hysteresis stops the display flickering between adjacent semitones, and
//! an EMA over the cents offset (measured against the locked note) settles
//! the needle. The stabilizer owns all of this state exclusively; it runs
//! in the consumer context, one update per received estimate.

use std::collections::VecDeque;

use crate::config::TunerConfig;
use crate::{PitchEstimate, TunerEvent};
use crate::note::{cents_off_from_midi, freq_to_midi, midi_to_note_name, wrap_cents};

/// One accepted pitch observation in the stabilizer's history.
#[derive(Debug, Clone, Copy)]
pub struct PitchSample {
    pub midi: i32,
    /// Offset from the nearest semitone, wrapped into `[-50, 50)`.
    pub cents: f32,
    pub hz: f32,
    pub confidence: f32,
    pub rms: f32,
}

/// A stabilized reading for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub note_name: String,
    pub midi: i32,
    /// EMA-smoothed cents offset relative to the locked note.
    pub cents: f32,
}

/// Note-locking state machine over a bounded history of pitch samples.
#[derive(Debug)]
pub struct NoteStabilizer {
    history: VecDeque<PitchSample>,
    history_len: usize,
    confidence_gate: f32,
    lock_frames: usize,
    cents_alpha: f32,

    locked_midi: Option<i32>,
    candidate_midi: Option<i32>,
    candidate_count: usize,
    cents_ema: Option<f32>,
}

impl NoteStabilizer {
    pub fn new(config: &TunerConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_len),
            history_len: config.history_len,
            confidence_gate: config.confidence_gate,
            lock_frames: config.lock_frames,
            cents_alpha: config.cents_alpha,
            locked_midi: None,
            candidate_midi: None,
            candidate_count: 0,
            cents_ema: None,
        }
    }

    /// Processes one estimate and returns the reading to display, if any.
    ///
    /// An estimate with no pitch, or below the confidence gate, clears all
    /// state: a fresh attack after silence starts from scratch rather than
    /// inheriting a stale lock.
    pub fn update(&mut self, estimate: PitchEstimate) -> Option<Reading> {
        let hz = match estimate.freq_hz {
            Some(hz) if estimate.confidence >= self.confidence_gate => hz,
            _ => {
                self.reset();
                return None;
            }
        };

        let midi = freq_to_midi(hz);
        let cents = wrap_cents(cents_off_from_midi(hz, midi));
        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(PitchSample {
            midi,
            cents,
            hz,
            confidence: estimate.confidence,
            rms: estimate.rms,
        });

        // Median over the history suppresses single-frame outliers without
        // the latency of a longer low-pass.
        let median_midi = median(self.history.iter().map(|s| s.midi as f32)).round() as i32;

        match self.locked_midi {
            None => {
                self.locked_midi = Some(median_midi);
            }
            Some(locked) if median_midi == locked => {
                // Stability confirmed; drop any pending candidate.
                self.candidate_midi = None;
                self.candidate_count = 0;
            }
            Some(_) => {
                if self.candidate_midi == Some(median_midi) {
                    self.candidate_count += 1;
                } else {
                    self.candidate_midi = Some(median_midi);
                    self.candidate_count = 1;
                }
                if self.candidate_count >= self.lock_frames {
                    self.locked_midi = self.candidate_midi.take();
                    self.candidate_count = 0;
                    // A note change must not inherit the previous note's
                    // smoothing history.
                    self.cents_ema = None;
                }
            }
        }

        let locked = self.locked_midi?;
        // Smooth the cents measured against the locked note, not the
        // per-frame nearest note.
        let cents_for_locked = wrap_cents(cents_off_from_midi(hz, locked));
        let ema = match self.cents_ema {
            None => cents_for_locked,
            Some(prev) => prev + self.cents_alpha * (cents_for_locked - prev),
        };
        self.cents_ema = Some(ema);

        Some(Reading {
            note_name: midi_to_note_name(locked),
            midi: locked,
            cents: ema,
        })
    }

    /// Maps one estimate to the downstream event: a stabilized `Reading`
    /// when a note is locked, otherwise `Silence` carrying the measured
    /// level and confidence.
    pub fn process(&mut self, estimate: PitchEstimate) -> TunerEvent {
        match self.update(estimate) {
            Some(reading) => TunerEvent::Reading {
                note_name: reading.note_name,
                cents_offset: reading.cents,
            },
            None => TunerEvent::Silence {
                rms: estimate.rms,
                confidence: estimate.confidence,
            },
        }
    }

    /// The currently locked note, if any.
    pub fn locked_midi(&self) -> Option<i32> {
        self.locked_midi
    }

    /// The current smoothed cents offset, if a note is locked.
    pub fn cents_ema(&self) -> Option<f32> {
        self.cents_ema
    }

    fn reset(&mut self) {
        self.history.clear();
        self.locked_midi = None;
        self.candidate_midi = None;
        self.candidate_count = 0;
        self.cents_ema = None;
    }
}

fn median(values: impl Iterator<Item = f32>) -> f32 {
    let mut sorted: Vec<f32> = values.collect();
    debug_assert!(!sorted.is_empty());
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::midi_to_freq;

    fn estimate(midi: i32) -> PitchEstimate {
        PitchEstimate {
            freq_hz: Some(midi_to_freq(midi)),
            confidence: 0.9,
            rms: 0.1,
        }
    }

    fn estimate_hz(hz: f32) -> PitchEstimate {
        PitchEstimate {
            freq_hz: Some(hz),
            confidence: 0.9,
            rms: 0.1,
        }
    }

    /// History of one isolates the lock hysteresis from the median filter.
    fn lock_only_config() -> TunerConfig {
        TunerConfig {
            history_len: 1,
            lock_frames: 3,
            ..Default::default()
        }
    }

    #[test]
    fn locks_immediately_on_first_sample() {
        let mut stab = NoteStabilizer::new(&lock_only_config());
        let reading = stab.update(estimate(69)).unwrap();
        assert_eq!(reading.midi, 69);
        assert_eq!(reading.note_name, "A4");
        for _ in 0..4 {
            assert_eq!(stab.update(estimate(69)).unwrap().midi, 69);
        }
    }

    #[test]
    fn single_outlier_does_not_switch_lock() {
        let mut stab = NoteStabilizer::new(&lock_only_config());
        for _ in 0..5 {
            stab.update(estimate(69));
        }
        stab.update(estimate(70));
        for _ in 0..4 {
            let reading = stab.update(estimate(69)).unwrap();
            assert_eq!(reading.midi, 69, "outlier must not move the lock");
        }
        assert_eq!(stab.locked_midi(), Some(69));
    }

    #[test]
    fn persistent_candidate_commits_after_three_frames() {
        let mut stab = NoteStabilizer::new(&lock_only_config());
        for _ in 0..5 {
            stab.update(estimate(69));
        }
        assert_eq!(stab.update(estimate(70)).unwrap().midi, 69);
        assert_eq!(stab.update(estimate(70)).unwrap().midi, 69);
        let reading = stab.update(estimate(70)).unwrap();
        assert_eq!(reading.midi, 70, "third consecutive frame must commit");
        assert_eq!(reading.note_name, "A#4");
    }

    #[test]
    fn commit_resets_cents_smoothing() {
        let mut stab = NoteStabilizer::new(&lock_only_config());
        // Settle on A4 slightly sharp so the EMA carries a nonzero value.
        for _ in 0..10 {
            stab.update(estimate_hz(443.0));
        }
        let before = stab.cents_ema().unwrap();
        assert!(before > 5.0);

        // Switch to B4, slightly flat.
        let hz = midi_to_freq(71) * 0.998;
        for _ in 0..2 {
            stab.update(estimate_hz(hz));
        }
        let reading = stab.update(estimate_hz(hz)).unwrap();
        assert_eq!(reading.midi, 71);
        // The EMA restarted from the new note's offset instead of decaying
        // from the old one.
        let expected = 1200.0 * (hz / midi_to_freq(71)).log2();
        assert!(
            (reading.cents - expected).abs() < 0.1,
            "EMA inherited stale history: got {}, expected {expected}",
            reading.cents
        );
    }

    #[test]
    fn no_pitch_clears_all_state() {
        let mut stab = NoteStabilizer::new(&lock_only_config());
        for _ in 0..5 {
            stab.update(estimate(69));
        }
        assert_eq!(stab.locked_midi(), Some(69));
        assert_eq!(stab.update(PitchEstimate::unpitched(0.0001)), None);
        assert_eq!(stab.locked_midi(), None);
        assert_eq!(stab.cents_ema(), None);
    }

    #[test]
    fn low_confidence_treated_as_no_pitch() {
        let mut stab = NoteStabilizer::new(&TunerConfig::default());
        let weak = PitchEstimate {
            freq_hz: Some(440.0),
            confidence: 0.3,
            rms: 0.1,
        };
        assert_eq!(stab.update(weak), None);
        assert_eq!(stab.locked_midi(), None);
    }

    #[test]
    fn median_filter_absorbs_spikes_with_default_history() {
        let mut stab = NoteStabilizer::new(&TunerConfig::default());
        for _ in 0..5 {
            stab.update(estimate(69));
        }
        // A wild octave spike in the middle of steady input never even
        // becomes a candidate: the median holds at 69.
        let reading = stab.update(estimate(81)).unwrap();
        assert_eq!(reading.midi, 69);
        let reading = stab.update(estimate(69)).unwrap();
        assert_eq!(reading.midi, 69);
    }

    #[test]
    fn cents_ema_lags_sudden_changes() {
        let mut stab = NoteStabilizer::new(&lock_only_config());
        for _ in 0..5 {
            stab.update(estimate_hz(440.0));
        }
        // A jump to +31 cents moves the displayed value only partway; the
        // lag is the point of the smoothing.
        let reading = stab.update(estimate_hz(448.0)).unwrap();
        assert_eq!(reading.midi, 69);
        let raw = 1200.0 * (448.0f32 / 440.0).log2();
        assert!(reading.cents > 0.5 && reading.cents < raw * 0.5);
    }
}
