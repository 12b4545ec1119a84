//! # Analysis Pipeline (producer context)
//!
//! Owns everything the real-time side needs: the sample ring, the drift
//! tracker, the Hann table, the scratch analysis window, and the YIN
//! estimator. All allocation happens in `Analyzer::new`; after that,
//! pushing blocks and running hops is allocation-free and never blocks.
//!
//! The caller drives the cadence: `push_block` on every delivered audio
//! block, `poll` whenever it wants to know if a hop is due. One hop
//! produces exactly one [`PitchEstimate`].

use std::time::Instant;

use anyhow::{Result, ensure};

use crate::PitchEstimate;
use crate::config::TunerConfig;
use crate::drift::RateTracker;
use crate::ring::SampleRing;
use crate::window::{HannWindow, remove_dc, rms};
use crate::yin::YinEstimator;

/// The producer-side analysis pipeline.
#[derive(Debug)]
pub struct Analyzer {
    ring: SampleRing,
    drift: RateTracker,
    hann: HannWindow,
    yin: YinEstimator,
    frame: Vec<f32>,
    rms_floor: f32,
    hop: std::time::Duration,
    next_hop: Instant,
    detector_runs: u64,
}

impl Analyzer {
    /// Builds the pipeline for a device running at `sample_rate`.
    ///
    /// Fails fast on malformed configuration; nothing after this point can
    /// error.
    pub fn new(config: &TunerConfig, sample_rate: u32) -> Result<Self> {
        config.validate()?;
        ensure!(sample_rate > 0, "sample rate must be nonzero");
        // The longest in-band lag must fit the scratch range, or the
        // candidate search would have nothing to scan.
        let longest_lag = sample_rate as f32 / config.min_freq_hz;
        ensure!(
            (longest_lag as usize) + 2 < config.window_size / 2,
            "window of {} samples too short for {} Hz at {} Hz sample rate",
            config.window_size,
            config.min_freq_hz,
            sample_rate
        );

        Ok(Self {
            ring: SampleRing::new(config.ring_capacity),
            drift: RateTracker::new(
                sample_rate as f32,
                std::time::Duration::from_secs_f32(config.drift_window_secs),
                config.drift_alpha,
                config.drift_rate_floor_hz,
            ),
            hann: HannWindow::new(config.window_size),
            yin: YinEstimator::new(config.window_size, config),
            frame: vec![0.0; config.window_size],
            rms_floor: config.rms_floor,
            hop: config.hop_interval(),
            next_hop: Instant::now(),
            detector_runs: 0,
        })
    }

    /// Copies one delivered audio block into the ring and feeds the drift
    /// tracker. Safe to call from the capture loop at any block size.
    pub fn push_block(&mut self, samples: &[f32]) {
        self.ring.push(samples);
        self.drift.record(samples.len());
    }

    /// Runs one hop if the hop interval has elapsed since the last one.
    pub fn poll(&mut self) -> Option<PitchEstimate> {
        self.poll_at(Instant::now())
    }

    /// `poll` against an explicit clock reading.
    pub fn poll_at(&mut self, now: Instant) -> Option<PitchEstimate> {
        if now < self.next_hop {
            return None;
        }
        self.next_hop = now + self.hop;
        Some(self.analyze())
    }

    /// Runs one analysis hop unconditionally.
    ///
    /// Window extraction, DC removal, the RMS gate, Hann tapering, and YIN
    /// detection, in that order. The gate bounds worst-case cost during
    /// silence: the detector is not invoked at all below the floor.
    pub fn analyze(&mut self) -> PitchEstimate {
        self.ring.latest(&mut self.frame);
        remove_dc(&mut self.frame);

        let level = rms(&self.frame);
        if level < self.rms_floor {
            return PitchEstimate::unpitched(level);
        }

        self.hann.apply(&mut self.frame);
        self.detector_runs += 1;
        match self.yin.detect(&self.frame, self.drift.effective_rate()) {
            Some(det) => PitchEstimate {
                freq_hz: Some(det.freq_hz),
                confidence: det.confidence,
                rms: level,
            },
            None => PitchEstimate::unpitched(level),
        }
    }

    /// How often the detector has actually run (the gate skips it during
    /// silence).
    pub fn detector_runs(&self) -> u64 {
        self.detector_runs
    }

    /// The drift-corrected sample rate currently in use.
    pub fn effective_rate(&self) -> f32 {
        self.drift.effective_rate()
    }

    /// Capacity of the underlying sample ring.
    pub fn ring_capacity(&self) -> usize {
        self.ring.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sine_block(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin() * amplitude)
            .collect()
    }

    #[test]
    fn construction_rejects_undersized_window() {
        let cfg = TunerConfig {
            window_size: 256,
            ring_capacity: 1024,
            ..Default::default()
        };
        // 44100 / 70 Hz needs 630 lags; a 256-sample window cannot hold them.
        assert!(Analyzer::new(&cfg, 44100).is_err());
    }

    #[test]
    fn silence_skips_the_detector() {
        let mut analyzer = Analyzer::new(&TunerConfig::default(), 44100).unwrap();
        analyzer.push_block(&vec![0.0; 8192]);
        for _ in 0..5 {
            let est = analyzer.analyze();
            assert_eq!(est.freq_hz, None);
            assert_eq!(est.confidence, 0.0);
        }
        assert_eq!(analyzer.detector_runs(), 0);
    }

    #[test]
    fn sub_floor_noise_skips_the_detector() {
        let mut analyzer = Analyzer::new(&TunerConfig::default(), 44100).unwrap();
        let quiet = sine_block(440.0, 44100.0, 8192, 0.001);
        analyzer.push_block(&quiet);
        let est = analyzer.analyze();
        assert_eq!(est.freq_hz, None);
        assert_eq!(analyzer.detector_runs(), 0);
        assert!(est.rms > 0.0);
    }

    #[test]
    fn tone_through_the_full_pipeline() {
        let mut analyzer = Analyzer::new(&TunerConfig::default(), 44100).unwrap();
        // Deliver in uneven block sizes, as real capture does.
        let tone = sine_block(440.0, 44100.0, 9000, 0.4);
        for chunk in tone.chunks(1536) {
            analyzer.push_block(chunk);
        }
        let est = analyzer.analyze();
        let freq = est.freq_hz.expect("tone not detected");
        assert!((freq - 440.0).abs() / 440.0 < 0.01, "got {freq} Hz");
        assert!(est.confidence > 0.5);
        assert_eq!(analyzer.detector_runs(), 1);
        // No measurement window has elapsed, so the drift tracker still
        // reports the nominal rate.
        assert_eq!(analyzer.effective_rate(), 44100.0);
    }

    #[test]
    fn poll_respects_hop_cadence() {
        let mut analyzer = Analyzer::new(&TunerConfig::default(), 44100).unwrap();
        analyzer.push_block(&sine_block(220.0, 44100.0, 8192, 0.4));

        let start = Instant::now() + Duration::from_secs(1);
        assert!(analyzer.poll_at(start).is_some());
        // Next hop is 50 ms away at the default 20 Hz cadence.
        assert!(analyzer.poll_at(start + Duration::from_millis(10)).is_none());
        assert!(analyzer.poll_at(start + Duration::from_millis(51)).is_some());
    }
}
