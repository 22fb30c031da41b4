//! Fixed-capacity sample history feeding the sparklines.

/// Number of samples kept per metric (one minute at the default interval).
pub const HISTORY_LEN: usize = 60;

/// Ring of `f32` samples. Capacity is fixed at construction; pushing
/// overwrites the oldest slot.
///
/// Capacity is at least one: `new(0)` yields a one-slot series, so
/// `snapshot` returns `max(N, 1)` values and `latest` always has a sample.
#[derive(Debug, Clone)]
pub struct HistorySeries {
    data: Box<[f32]>,
    head: usize,
}

impl HistorySeries {
    /// Create a zero-filled series with `max(capacity, 1)` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)].into_boxed_slice(),
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Append a sample, overwriting the oldest.
    pub fn push(&mut self, value: f32) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.data.len();
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> f32 {
        let len = self.data.len();
        self.data[(self.head + len - 1) % len]
    }

    /// Copy samples oldest-first into `dst` without allocating.
    ///
    /// Copies `min(dst.len(), capacity)` values; the render path always
    /// passes a buffer of exactly `capacity`.
    pub fn snapshot_into(&self, dst: &mut [f32]) {
        let len = self.data.len();
        for (i, slot) in dst.iter_mut().take(len).enumerate() {
            *slot = self.data[(self.head + i) % len];
        }
    }

    /// Oldest-first copy of the whole ring.
    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.data.len()];
        self.snapshot_into(&mut out);
        out
    }
}

impl Default for HistorySeries {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}
