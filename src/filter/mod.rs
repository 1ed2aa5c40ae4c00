//! Filters for rate conversion.

mod design;
pub use design::*;

use crate::Sample;

/// Prototype lowpass filter split into polyphase branches.
#[derive(Clone, Debug)]
pub struct PolyphaseTaps {
    phases: usize,
    taps_per_phase: usize,
    /// Branch p is stored at p * taps_per_phase.
    taps: Vec<Sample>,
}

impl PolyphaseTaps {
    /// Split prototype taps into `phases` branches.
    /// Branch p takes every `phases`th tap starting at p.
    pub fn from_prototype(prototype: &[Sample], phases: usize) -> Self {
        let taps_per_phase = prototype.len() / phases.max(1);
        let mut taps = Vec::with_capacity(phases * taps_per_phase);
        for p in 0..phases {
            taps.extend((0..taps_per_phase).map(|k| prototype[p + k * phases]));
        }
        Self { phases, taps_per_phase, taps }
    }

    pub fn phases(&self) -> usize {
        self.phases
    }

    pub fn taps_per_phase(&self) -> usize {
        self.taps_per_phase
    }

    /// Taps of one branch. Tap k multiplies the input sample k steps in the past.
    pub fn phase(&self, p: usize) -> &[Sample] {
        &self.taps[p * self.taps_per_phase .. (p + 1) * self.taps_per_phase]
    }

    /// Scale every branch to unity gain at DC.
    pub fn normalize_phases(&mut self) {
        for branch in self.taps.chunks_exact_mut(self.taps_per_phase.max(1)) {
            let sum = branch.iter().sum::<Sample>();
            if sum != 0.0 {
                let scaling = 1.0 / sum;
                for value in branch.iter_mut() {
                    *value *= scaling;
                }
            }
        }
    }
}
