//! Complex sample buffer with an optional guard margin.

use std::ops::{Deref, DerefMut};

use crate::ComplexSample;
use crate::num_traits::Zero;

/// Owned block of complex samples.
///
/// The first `guard_len()` samples are a margin ahead of the active window,
/// used by filters that need input history contiguous with new samples.
/// Dereferencing gives the active window only.
#[derive(Debug, Default, PartialEq)]
pub struct SampleBuffer {
    data: Vec<ComplexSample>,
    start: usize,
}

impl SampleBuffer {
    pub fn new(len: usize) -> Self {
        Self::with_guard(len, 0)
    }

    pub fn with_guard(len: usize, guard: usize) -> Self {
        Self {
            data: vec![ComplexSample::zero(); guard + len],
            start: guard,
        }
    }

    pub fn from_samples(samples: &[ComplexSample]) -> Self {
        Self {
            data: samples.to_vec(),
            start: 0,
        }
    }

    pub fn guard_len(&self) -> usize {
        self.start
    }

    /// Guard margin followed by the active window.
    pub fn full_mut(&mut self) -> &mut [ComplexSample] {
        &mut self.data[..]
    }

    /// Mean power of the active window.
    pub fn energy(&self) -> f32 {
        let active = &self.data[self.start..];
        if active.is_empty() {
            return 0.0;
        }
        active.iter().map(|s| s.norm_sqr()).sum::<f32>() / active.len() as f32
    }
}

impl Deref for SampleBuffer {
    type Target = [ComplexSample];

    fn deref(&self) -> &[ComplexSample] {
        &self.data[self.start..]
    }
}

impl DerefMut for SampleBuffer {
    fn deref_mut(&mut self) -> &mut [ComplexSample] {
        &mut self.data[self.start..]
    }
}
