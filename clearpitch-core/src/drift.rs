//! # Sample-Rate Drift Tracker
//!
//! Some platforms silently resample or drop samples, so the rate audio
//! actually arrives at can diverge from the nominal rate the device
//! reports. That divergence shows up directly as a systematic pitch bias.
//! This tracker measures real sample throughput against the wall clock and
//! keeps a smoothed estimate of the effective delivery rate for the
//! detector to use in place of the nominal rate.

use std::time::{Duration, Instant};

/// Smoothed estimate of the effective audio delivery rate.
#[derive(Debug)]
pub struct RateTracker {
    nominal_hz: f32,
    smoothed: Option<f32>,
    samples: u64,
    since: Instant,
    window: Duration,
    alpha: f32,
    floor_hz: f32,
}

impl RateTracker {
    /// Creates a tracker that folds a new throughput measurement into the
    /// estimate every `window` of wall-clock time, EMA-smoothed by `alpha`.
    /// Measurements at or below `floor_hz` are discarded as nonsense.
    pub fn new(nominal_hz: f32, window: Duration, alpha: f32, floor_hz: f32) -> Self {
        Self {
            nominal_hz,
            smoothed: None,
            samples: 0,
            since: Instant::now(),
            window,
            alpha,
            floor_hz,
        }
    }

    /// Records that `count` samples just arrived.
    pub fn record(&mut self, count: usize) {
        self.record_at(count, Instant::now());
    }

    /// Records arrivals against an explicit clock reading.
    ///
    /// Once the accumulated span reaches the measurement window, the
    /// measured rate is folded into the estimate and the counters reset.
    pub fn record_at(&mut self, count: usize, now: Instant) {
        self.samples += count as u64;

        let elapsed = now.saturating_duration_since(self.since);
        if elapsed < self.window {
            return;
        }

        let measured = self.samples as f32 / elapsed.as_secs_f32();
        if measured.is_finite() && measured > self.floor_hz {
            self.smoothed = Some(match self.smoothed {
                None => measured,
                Some(rate) => rate + self.alpha * (measured - rate),
            });
        }
        self.samples = 0;
        self.since = now;
    }

    /// The current best rate estimate: the smoothed measurement when one
    /// exists, otherwise the nominal configured rate.
    #[inline]
    pub fn effective_rate(&self) -> f32 {
        self.smoothed.unwrap_or(self.nominal_hz)
    }

    /// The nominal rate the device reported at startup.
    #[inline]
    pub fn nominal_rate(&self) -> f32 {
        self.nominal_hz
    }
}
