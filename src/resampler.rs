//! Rational rate conversion between the device clock and the protocol clock.

use thiserror::Error;

use crate::{ComplexSample, Sample};
use crate::filter;
use crate::num_traits::Zero;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResampleError {
    #[error("invalid resampling ratio {interpolation}:{decimation} with {taps_per_phase} taps per phase")]
    InvalidRatio { interpolation: usize, decimation: usize, taps_per_phase: usize },
    #[error("resampler used before init")]
    NotInitialized,
    #[error("input guard of {got} samples is shorter than the {needed} sample history")]
    ShortGuard { needed: usize, got: usize },
    #[error("{input} input samples do not map to {output} output samples at ratio {interpolation}:{decimation}")]
    LengthMismatch { input: usize, output: usize, interpolation: usize, decimation: usize },
}

/// Per-channel rate converter used by the receive pipeline.
pub trait RateConverter: Send {
    /// Prepare filter state. Must succeed before `rotate` is used.
    fn init(&mut self) -> Result<(), ResampleError>;

    /// Frequency translate and rate convert one block.
    ///
    /// `input` starts with `required_history()` guard samples followed
    /// by the new samples. The guard is overwritten with history kept
    /// from previous calls. Every sample of `output` is written.
    fn rotate(
        &mut self,
        input: &mut [ComplexSample],
        output: &mut [ComplexSample],
    ) -> Result<(), ResampleError>;

    /// Number of guard samples needed ahead of the new input samples.
    fn required_history(&self) -> usize;
}

/// Polyphase resampler with output rate `interpolation / decimation`
/// times the input rate.
pub struct PolyphaseResampler {
    interpolation: usize,
    decimation: usize,
    taps_per_phase: usize,
    bandwidth: f64,
    /// Designed in init.
    taps: Option<filter::PolyphaseTaps>,
    /// Last input samples of the previous block.
    history: Vec<ComplexSample>,
    /// Mixer phase in cycles.
    mixer_phase: f64,
    /// Mixer frequency in cycles per output sample.
    mixer_step: f64,
}

impl PolyphaseResampler {
    pub fn new(interpolation: usize, decimation: usize, taps_per_phase: usize) -> Self {
        Self {
            interpolation,
            decimation,
            taps_per_phase,
            bandwidth: 0.9,
            taps: None,
            history: Vec::new(),
            mixer_phase: 0.0,
            mixer_step: 0.0,
        }
    }

    /// Set the cutoff relative to the narrower Nyquist band.
    pub fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Shift the output spectrum by `cycles_per_sample` at the output rate.
    pub fn with_frequency_offset(mut self, cycles_per_sample: f64) -> Self {
        self.mixer_step = cycles_per_sample;
        self
    }
}

impl RateConverter for PolyphaseResampler {
    fn init(&mut self) -> Result<(), ResampleError> {
        if self.interpolation == 0 || self.decimation == 0 || self.taps_per_phase == 0 {
            return Err(ResampleError::InvalidRatio {
                interpolation: self.interpolation,
                decimation: self.decimation,
                taps_per_phase: self.taps_per_phase,
            });
        }
        self.taps = Some(filter::design_polyphase_lowpass(
            self.interpolation,
            self.decimation,
            self.taps_per_phase,
            self.bandwidth,
        ));
        self.history = vec![ComplexSample::zero(); self.taps_per_phase];
        self.mixer_phase = 0.0;
        Ok(())
    }

    fn rotate(
        &mut self,
        input: &mut [ComplexSample],
        output: &mut [ComplexSample],
    ) -> Result<(), ResampleError> {
        let taps = self.taps.as_ref().ok_or(ResampleError::NotInitialized)?;
        let hist = self.history.len();
        if input.len() < hist {
            return Err(ResampleError::ShortGuard { needed: hist, got: input.len() });
        }
        let n_in = input.len() - hist;
        let n_out = output.len();
        if n_in * self.interpolation != n_out * self.decimation {
            return Err(ResampleError::LengthMismatch {
                input: n_in,
                output: n_out,
                interpolation: self.interpolation,
                decimation: self.decimation,
            });
        }

        input[..hist].copy_from_slice(&self.history);

        for (n, out) in output.iter_mut().enumerate() {
            let t = n * self.decimation;
            // Newest input sample contributing to this output
            let newest = hist + t / self.interpolation;
            let branch = taps.phase(t % self.interpolation);
            let mut acc = ComplexSample::zero();
            for (k, &tap) in branch.iter().enumerate() {
                acc += input[newest - k] * tap;
            }
            *out = acc;
        }

        if self.mixer_step != 0.0 {
            for out in output.iter_mut() {
                let phase = (self.mixer_phase * 2.0 * std::f64::consts::PI) as Sample;
                *out *= ComplexSample::from_polar(1.0, phase);
                self.mixer_phase = (self.mixer_phase + self.mixer_step).rem_euclid(1.0);
            }
        }

        self.history.copy_from_slice(&input[input.len() - hist ..]);
        Ok(())
    }

    fn required_history(&self) -> usize {
        self.taps_per_phase
    }
}
