//! # YIN Pitch Estimator
//!
//! The numerical core of the tuner: the YIN algorithm (de Cheveigné &
//! Kawahara, 2002) with a band-restricted candidate search, a
//! harmonic/subharmonic refinement pass that corrects octave errors, and
//! parabolic interpolation for sub-lag accuracy. The estimator owns its
//! scratch arrays and reuses them on every call, so the real-time path
//! never allocates.

use crate::config::TunerConfig;

/// One successful detection: a frequency and how periodic the frame was.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub freq_hz: f32,
    /// `1 - cmnd` at the chosen lag, clamped into 0..=1.
    pub confidence: f32,
}

/// Reusable YIN estimator for a fixed analysis window length.
#[derive(Debug)]
pub struct YinEstimator {
    diff: Vec<f32>,
    cmnd: Vec<f32>,
    min_freq_hz: f32,
    max_freq_hz: f32,
    report_min_hz: f32,
    report_max_hz: f32,
    threshold: f32,
    octave_penalty: f32,
}

impl YinEstimator {
    /// Allocates scratch for windows of `window_size` samples.
    pub fn new(window_size: usize, config: &TunerConfig) -> Self {
        let max_tau = window_size / 2;
        Self {
            diff: vec![0.0; max_tau],
            cmnd: vec![0.0; max_tau],
            min_freq_hz: config.min_freq_hz,
            max_freq_hz: config.max_freq_hz,
            report_min_hz: config.report_min_hz,
            report_max_hz: config.report_max_hz,
            threshold: config.yin_threshold,
            octave_penalty: config.octave_penalty,
        }
    }

    /// Runs one detection over a preprocessed (DC-removed, windowed) frame.
    ///
    /// Returns `None` when the frame is not periodic enough or the result
    /// falls outside the supported musical band.
    pub fn detect(&mut self, frame: &[f32], sample_rate: f32) -> Option<Detection> {
        let n = frame.len();
        let max_tau = (n / 2).min(self.diff.len());
        if max_tau < 4 || !sample_rate.is_finite() || sample_rate <= 0.0 {
            return None;
        }
        let diff = &mut self.diff[..max_tau];
        let cmnd = &mut self.cmnd[..max_tau];

        // Difference function: squared dissimilarity at each candidate lag.
        diff[0] = 0.0;
        for tau in 1..max_tau {
            let mut sum = 0.0f32;
            for i in 0..(n - tau) {
                let delta = frame[i] - frame[i + tau];
                sum += delta * delta;
            }
            diff[tau] = sum;
        }

        // Cumulative mean normalized difference.
        cmnd[0] = 1.0;
        let mut running_sum = 0.0f32;
        for tau in 1..max_tau {
            running_sum += diff[tau];
            cmnd[tau] = if running_sum > 0.0 {
                diff[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }

        // Candidate search restricted to the supported pitch band.
        let tau_min = ((sample_rate / self.max_freq_hz) as usize).max(2);
        let tau_max = ((sample_rate / self.min_freq_hz) as usize).min(max_tau - 2);
        if tau_min >= tau_max {
            return None;
        }

        let mut best_tau = 0usize;
        let mut best_val = f32::INFINITY;
        for tau in tau_min..=tau_max {
            let v = cmnd[tau];
            if v <= cmnd[tau - 1] && v <= cmnd[tau + 1] && v < best_val {
                best_val = v;
                best_tau = tau;
            }
        }
        if best_tau == 0 {
            // No local minimum in band; fall back to the global in-band minimum.
            for tau in tau_min..=tau_max {
                if cmnd[tau] < best_val {
                    best_val = cmnd[tau];
                    best_tau = tau;
                }
            }
        }
        if best_val > self.threshold {
            return None;
        }

        // Harmonic/subharmonic refinement: re-score half/third/double/triple
        // lags, penalized by octave distance, to correct octave errors
        // without blindly halving or doubling.
        let t = best_tau;
        let mut chosen = t;
        let mut chosen_score = cmnd[t];
        for cand in [t / 2, t / 3, t * 2, t * 3] {
            if cand < tau_min || cand > tau_max || cand == t {
                continue;
            }
            let ratio = cand as f32 / t as f32;
            let score = cmnd[cand] + self.octave_penalty * ratio.log2().abs();
            if score < chosen_score {
                chosen_score = score;
                chosen = cand;
            }
        }

        // Parabolic interpolation around the chosen integer lag.
        let t = chosen.clamp(2, max_tau - 2);
        let y1 = cmnd[t - 1];
        let y2 = cmnd[t];
        let y3 = cmnd[t + 1];
        let denom = y1 - 2.0 * y2 + y3;
        let better_tau = if denom.abs() > 1e-12 {
            t as f32 + (y1 - y3) / (2.0 * denom)
        } else {
            t as f32
        };
        if better_tau <= 0.0 {
            return None;
        }

        let freq_hz = sample_rate / better_tau;
        if !freq_hz.is_finite() || freq_hz < self.report_min_hz || freq_hz > self.report_max_hz {
            return None;
        }

        Some(Detection {
            freq_hz,
            confidence: (1.0 - y2).clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{HannWindow, remove_dc};

    const SR: f32 = 44100.0;
    const N: usize = 4096;

    fn windowed_sine(freq: f32) -> Vec<f32> {
        let mut frame: Vec<f32> = (0..N)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SR).sin() * 0.4)
            .collect();
        remove_dc(&mut frame);
        HannWindow::new(N).apply(&mut frame);
        frame
    }

    #[test]
    fn detects_pure_tones_across_the_band() {
        let mut yin = YinEstimator::new(N, &TunerConfig::default());
        for freq in [82.41f32, 220.0, 440.0, 880.0] {
            let frame = windowed_sine(freq);
            let det = yin
                .detect(&frame, SR)
                .unwrap_or_else(|| panic!("no pitch for {freq} Hz"));
            let rel = (det.freq_hz - freq).abs() / freq;
            assert!(rel < 0.01, "{freq} Hz detected as {} Hz", det.freq_hz);
            assert!(det.confidence > 0.2, "low confidence at {freq} Hz");
        }
    }

    #[test]
    fn scratch_is_reused_across_calls() {
        let mut yin = YinEstimator::new(N, &TunerConfig::default());
        let a = yin.detect(&windowed_sine(440.0), SR).unwrap();
        let _ = yin.detect(&windowed_sine(110.0), SR).unwrap();
        let b = yin.detect(&windowed_sine(440.0), SR).unwrap();
        assert!((a.freq_hz - b.freq_hz).abs() < 0.5);
    }

    #[test]
    fn all_zero_frame_has_no_pitch() {
        let mut yin = YinEstimator::new(N, &TunerConfig::default());
        let frame = vec![0.0f32; N];
        assert_eq!(yin.detect(&frame, SR), None);
    }

    #[test]
    fn out_of_band_tone_rejected() {
        let mut yin = YinEstimator::new(N, &TunerConfig::default());
        // 30 Hz is below the supported band; its period is also longer than
        // the in-band lag range, so no periodic dip should survive.
        let frame = windowed_sine(30.0);
        assert_eq!(yin.detect(&frame, SR), None);
    }

    #[test]
    fn strong_second_harmonic_does_not_cause_octave_error() {
        let freq = 220.0f32;
        let mut frame: Vec<f32> = (0..N)
            .map(|i| {
                let t = i as f32 / SR;
                let w = 2.0 * std::f32::consts::PI * freq * t;
                0.5 * w.sin() + 0.45 * (2.0 * w).sin() + 0.2 * (3.0 * w).sin()
            })
            .collect();
        remove_dc(&mut frame);
        HannWindow::new(N).apply(&mut frame);

        let mut yin = YinEstimator::new(N, &TunerConfig::default());
        let det = yin.detect(&frame, SR).expect("no pitch detected");
        let rel = (det.freq_hz - freq).abs() / freq;
        assert!(
            rel < 0.01,
            "expected ~{freq} Hz, got {} Hz (octave error)",
            det.freq_hz
        );
    }
}
