// clearpitch-core/src/lib.rs

//! The core logic for the chromatic instrument tuner.
//! This crate is responsible for audio capture, YIN pitch detection,
//! and note stabilization. It is completely headless
//! and contains no UI code.

pub mod analyzer;
pub mod audio;
pub mod config;
pub mod drift;
pub mod note;
pub mod ring;
pub mod stabilizer;
pub mod window;
pub mod yin;

/// The result of one analysis hop, sent from the audio thread to the consumer.
// Copy keeps the channel send cheap; a delivered estimate is an immutable value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// The detected fundamental frequency in Hz, or `None` when no reliable
    /// periodicity was found (silence, noise, or out-of-band result).
    pub freq_hz: Option<f32>,
    /// How periodic the frame was (0.0 to 1.0). Zero whenever `freq_hz` is `None`.
    pub confidence: f32,
    /// RMS level of the analysis window, reported even during silence.
    pub rms: f32,
}

impl PitchEstimate {
    /// An estimate carrying no pitch, only the measured level.
    pub fn unpitched(rms: f32) -> Self {
        Self {
            freq_hz: None,
            confidence: 0.0,
            rms,
        }
    }
}

/// Typed event stream delivered to the display collaborator.
///
/// `Ready` is emitted once at startup; every analysis hop afterwards produces
/// exactly one `Reading` or `Silence`. The cents offset in `Reading` is
/// already median-filtered and EMA-smoothed and must not be re-filtered.
#[derive(Debug, Clone, PartialEq)]
pub enum TunerEvent {
    Ready {
        sample_rate: u32,
        buffer_capacity: usize,
    },
    Reading {
        note_name: String,
        cents_offset: f32,
    },
    Silence {
        rms: f32,
        confidence: f32,
    },
}
