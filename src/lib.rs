
pub use rustfft::num_complex as num_complex;
pub use rustfft::num_traits as num_traits;
/// Floating point type used for signal processing.
pub type Sample = f32;
/// Complex floating point type used for signal processing.
pub type ComplexSample = num_complex::Complex<Sample>;
/// Mathematical consts for the Sample type.
pub use std::f32::consts as sample_consts;

pub mod buffer;
pub mod configuration;
pub mod convert;
pub mod device;
pub mod error;
pub mod filter;
pub mod noise;
pub mod queue;
pub mod resampler;
pub mod rx_dsp;
pub mod rxthings;
pub mod timed;
pub mod timing;
