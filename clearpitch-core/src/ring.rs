//! # Circular Sample Buffer
//!
//! Fixed-capacity rolling history of incoming mono samples. Writes overwrite
//! the oldest data once capacity is exceeded; that is the intended behavior,
//! not an overflow error. Allocation happens once at construction and never
//! again, so the audio callback can push into it freely.

/// Fixed-capacity ring store for mono samples.
///
/// The write cursor always points at the slot the next sample will land in,
/// so the most recently written sample sits just behind it (mod capacity).
#[derive(Debug, Clone)]
pub struct SampleRing {
    data: Vec<f32>,
    write: usize,
    filled: usize,
}

impl SampleRing {
    /// Creates a ring holding `capacity` samples, pre-filled with silence.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity],
            write: 0,
            filled: 0,
        }
    }

    /// Returns the fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns how many samples have been written, saturating at capacity.
    #[inline]
    pub fn len(&self) -> usize {
        self.filled
    }

    /// Returns true when nothing has been written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Appends samples in FIFO order, overwriting the oldest data on wrap.
    ///
    /// An input longer than the whole ring keeps only its tail; everything
    /// earlier would have been overwritten anyway.
    pub fn push(&mut self, samples: &[f32]) {
        let cap = self.data.len();
        if cap == 0 || samples.is_empty() {
            return;
        }

        let src = if samples.len() > cap {
            &samples[samples.len() - cap..]
        } else {
            samples
        };

        let first = src.len().min(cap - self.write);
        self.data[self.write..self.write + first].copy_from_slice(&src[..first]);
        let second = src.len() - first;
        if second > 0 {
            self.data[..second].copy_from_slice(&src[first..]);
        }

        self.write = (self.write + src.len()) % cap;
        self.filled = (self.filled + samples.len()).min(cap);
    }

    /// Copies the most recent `out.len()` samples into `out`, oldest first.
    ///
    /// Returns `false` and zero-fills `out` when more samples are requested
    /// than the ring can hold. A request larger than what has been written
    /// so far succeeds; the leading part is the ring's initial silence.
    pub fn latest(&self, out: &mut [f32]) -> bool {
        let n = out.len();
        let cap = self.data.len();
        if n > cap {
            out.fill(0.0);
            return false;
        }
        if n == 0 {
            return true;
        }

        let start = (self.write + cap - n) % cap;
        let first = n.min(cap - start);
        out[..first].copy_from_slice(&self.data[start..start + first]);
        if n > first {
            out[first..].copy_from_slice(&self.data[..n - first]);
        }
        true
    }

    /// Resets the ring to silence without reallocating.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.write = 0;
        self.filled = 0;
    }
}
