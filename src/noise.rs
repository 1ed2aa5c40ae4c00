//! Running noise level estimate.

use crate::Sample;

/// Fixed length circular window of noise power values.
pub struct NoiseLevel {
    values: Vec<Sample>,
    /// Next slot to write.
    position: usize,
    /// Number of values inserted, saturating at capacity.
    written: usize,
}

impl NoiseLevel {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![0.0; capacity],
            position: 0,
            written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Store a value, overwriting the oldest one once the window is full.
    /// Returns false if the window has no capacity.
    pub fn insert(&mut self, value: Sample) -> bool {
        if self.values.is_empty() {
            return false;
        }
        self.values[self.position] = value;
        self.position += 1;
        if self.position == self.values.len() {
            self.position = 0;
        }
        self.written = (self.written + 1).min(self.values.len());
        true
    }

    /// Mean over the whole window.
    ///
    /// Slots not written yet count as zero, so the estimate
    /// starts low until the window has wrapped once.
    pub fn average(&self) -> Sample {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<Sample>() / self.values.len() as Sample
    }

    /// Mean over the slots written so far.
    pub fn average_written(&self) -> Sample {
        if self.written == 0 {
            return 0.0;
        }
        // Until the first wrap, written slots are exactly the leading ones
        self.values[..self.written].iter().sum::<Sample>() / self.written as Sample
    }
}
