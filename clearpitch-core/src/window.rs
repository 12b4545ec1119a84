//! # Window & Preprocessing
//!
//! Per-window preprocessing applied before pitch detection: DC offset
//! removal, Hann tapering from a precomputed coefficient table, RMS level
//! measurement, and loudness-based channel selection for dual-channel input.

/// Precomputed Hann coefficient table for one analysis window length.
///
/// Built once at pipeline start; applying it is a single multiply per
/// sample, which keeps the real-time path allocation-free.
#[derive(Debug, Clone)]
pub struct HannWindow {
    coeffs: Vec<f32>,
}

impl HannWindow {
    /// Builds the table `hann[i] = 0.5 * (1 - cos(2π·i/(n-1)))`.
    pub fn new(n: usize) -> Self {
        let coeffs = if n < 2 {
            vec![1.0; n]
        } else {
            let n_minus_1 = (n - 1) as f32;
            (0..n)
                .map(|i| {
                    0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos())
                })
                .collect()
        };
        Self { coeffs }
    }

    /// Returns the window length the table was built for.
    #[inline]
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Multiplies the buffer sample-wise by the coefficient table.
    ///
    /// The buffer length must match the table length.
    pub fn apply(&self, buffer: &mut [f32]) {
        debug_assert_eq!(buffer.len(), self.coeffs.len());
        for (sample, &c) in buffer.iter_mut().zip(&self.coeffs) {
            *sample *= c;
        }
    }
}

/// Removes the DC offset from a signal by making its average value zero.
///
/// A DC component shows up as spurious low-lag dissimilarity in the
/// difference function, so windows are centered before detection.
pub fn remove_dc(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Root-mean-square level of a signal. Returns 0.0 for an empty slice.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Picks the channel with higher RMS energy, without mixing.
///
/// For dual-channel input this selects the channel most likely carrying
/// signal rather than noise floor. Ties go to the left channel.
pub fn louder_channel<'a>(left: &'a [f32], right: &'a [f32]) -> &'a [f32] {
    if rms(right) > rms(left) { right } else { left }
}
