//! # Pipeline Configuration
//!
//! Every tunable constant in the pipeline lives here, fixed at construction
//! time. None of these are runtime-mutable: the analyzer and stabilizer copy
//! what they need when they are built. The defaults are the empirically
//! tuned values; they are configuration, not derived requirements.

use std::time::Duration;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Fixed configuration for the whole analysis pipeline.
///
/// `validate()` must pass before any real-time invocation begins; a config
/// that validates cannot produce a fatal error inside the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Ring buffer capacity in samples. Must be at least twice the analysis
    /// window so the detector always sees an uncorrupted full window.
    pub ring_capacity: usize,
    /// Analysis window length in samples.
    pub window_size: usize,
    /// Analysis cadence: hops per second.
    pub hop_rate_hz: f32,
    /// Lower edge of the pitch band searched by the detector, in Hz.
    pub min_freq_hz: f32,
    /// Upper edge of the pitch band searched by the detector, in Hz.
    pub max_freq_hz: f32,
    /// Final sanity band for reported frequencies, in Hz. Slightly wider at
    /// the bottom than the search band so interpolation near the edge is
    /// not clipped away.
    pub report_min_hz: f32,
    pub report_max_hz: f32,
    /// CMND value above which a candidate lag is rejected as not periodic.
    pub yin_threshold: f32,
    /// Penalty weight applied per octave of distance during the
    /// harmonic/subharmonic candidate refinement.
    pub octave_penalty: f32,
    /// RMS below this floor skips the detector entirely.
    pub rms_floor: f32,
    /// Estimates below this confidence are treated as no-pitch by the
    /// stabilizer.
    pub confidence_gate: f32,
    /// Number of pitch samples kept for median filtering.
    pub history_len: usize,
    /// Hops a new note must persist before the lock switches to it.
    pub lock_frames: usize,
    /// Smoothing factor for the displayed cents EMA.
    pub cents_alpha: f32,
    /// Smoothing factor for the effective-sample-rate EMA.
    pub drift_alpha: f32,
    /// Wall-clock span over which sample throughput is measured before each
    /// fold into the effective-rate estimate.
    pub drift_window_secs: f32,
    /// Measured rates below this floor are discarded as nonsense.
    pub drift_rate_floor_hz: f32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 16384,
            window_size: 4096,
            hop_rate_hz: 20.0,
            min_freq_hz: 70.0,
            max_freq_hz: 1200.0,
            report_min_hz: 60.0,
            report_max_hz: 1200.0,
            yin_threshold: 0.2,
            octave_penalty: 0.04,
            rms_floor: 0.002,
            confidence_gate: 0.5,
            history_len: 5,
            lock_frames: 3,
            cents_alpha: 0.2,
            drift_alpha: 0.2,
            drift_window_secs: 0.5,
            drift_rate_floor_hz: 1000.0,
        }
    }
}

impl TunerConfig {
    /// Checks the structural invariants the pipeline relies on.
    ///
    /// Fails fast at construction rather than mid-stream: every check here
    /// guards something the hot path assumes without re-checking.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.window_size >= 16, "analysis window too small");
        ensure!(
            self.ring_capacity >= 2 * self.window_size,
            "ring capacity {} must be at least twice the window size {}",
            self.ring_capacity,
            self.window_size
        );
        ensure!(
            self.hop_rate_hz > 0.0 && self.hop_rate_hz.is_finite(),
            "hop rate must be positive"
        );
        ensure!(
            self.min_freq_hz > 0.0 && self.min_freq_hz < self.max_freq_hz,
            "invalid pitch band: {}..{} Hz",
            self.min_freq_hz,
            self.max_freq_hz
        );
        ensure!(
            self.report_min_hz > 0.0 && self.report_min_hz < self.report_max_hz,
            "invalid report band: {}..{} Hz",
            self.report_min_hz,
            self.report_max_hz
        );
        ensure!(
            self.yin_threshold > 0.0 && self.octave_penalty >= 0.0,
            "invalid detector thresholds"
        );
        ensure!(self.rms_floor >= 0.0, "RMS floor must not be negative");
        ensure!(
            (0.0..=1.0).contains(&self.confidence_gate),
            "confidence gate must be within 0..=1"
        );
        ensure!(
            self.history_len >= 1 && self.lock_frames >= 1,
            "history length and lock persistence must be at least 1"
        );
        ensure!(
            self.cents_alpha > 0.0 && self.cents_alpha <= 1.0,
            "cents EMA factor must be within (0, 1]"
        );
        ensure!(
            self.drift_alpha > 0.0 && self.drift_alpha <= 1.0,
            "drift EMA factor must be within (0, 1]"
        );
        ensure!(
            self.drift_window_secs > 0.0 && self.drift_rate_floor_hz > 0.0,
            "invalid drift tracker parameters"
        );
        Ok(())
    }

    /// The wall-clock interval between analysis hops.
    pub fn hop_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.hop_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TunerConfig::default().validate().is_ok());
    }

    #[test]
    fn ring_must_cover_two_windows() {
        let cfg = TunerConfig {
            ring_capacity: 4096,
            window_size: 4096,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_pitch_band_rejected() {
        let cfg = TunerConfig {
            min_freq_hz: 1200.0,
            max_freq_hz: 70.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_hop_rate_rejected() {
        let cfg = TunerConfig {
            hop_rate_hz: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hop_interval_matches_rate() {
        let cfg = TunerConfig::default();
        let hop = cfg.hop_interval();
        assert!((hop.as_secs_f32() - 0.05).abs() < 1e-6);
    }
}
