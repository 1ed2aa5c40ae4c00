//! Filter design

use crate::{Sample, sample_consts};
use super::PolyphaseTaps;

/// Design a windowed sinc lowpass at the upsampled rate of a
/// `interpolation / decimation` resampler and split it into branches.
///
/// `bandwidth` scales the cutoff relative to the narrower Nyquist band
/// of the input and output rates.
pub fn design_polyphase_lowpass(
    interpolation: usize,
    decimation: usize,
    taps_per_phase: usize,
    bandwidth: f64,
) -> PolyphaseTaps {
    let length = interpolation * taps_per_phase;
    // Cutoff in cycles per upsampled sample
    let cutoff = (bandwidth * 0.5 / interpolation.max(decimation) as f64) as Sample;
    let center = (length as Sample - 1.0) / 2.0;
    let window_freq = 2.0 * sample_consts::PI / (length as Sample - 1.0).max(1.0);

    let prototype = (0..length).map(|i| {
        let t = i as Sample - center;
        let sinc_phase = 2.0 * sample_consts::PI * cutoff * t;
        let sinc = if sinc_phase.abs() < 1e-9 { 1.0 } else { sinc_phase.sin() / sinc_phase };
        // Blackman window
        let w = i as Sample * window_freq;
        sinc * (0.42 - 0.5 * w.cos() + 0.08 * (2.0 * w).cos())
    }).collect::<Vec<Sample>>();

    let mut taps = PolyphaseTaps::from_prototype(&prototype[..], interpolation);
    taps.normalize_phases();
    taps
}
