//! Errors of the receive pipeline.

use thiserror::Error;

use crate::resampler::ResampleError;

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("unsupported channel configuration: {rf_chains} RF chains, {channels} channels")]
    UnsupportedTopology { rf_chains: usize, channels: usize },
    #[error("invalid inner receive buffer size {size} (need at least {required})")]
    BufferTooSmall { size: usize, required: usize },
    #[error("receive resampler for channel {channel} failed to initialize: {source}")]
    ResamplerInit { channel: usize, source: ResampleError },
    #[error("receive error: got {actual} of {expected} samples")]
    DeviceRead { expected: usize, actual: usize },
    #[error("sample rate downsampling error on channel {channel}: {source}")]
    Resampling { channel: usize, source: ResampleError },
}

impl RadioError {
    /// True for errors that come from the pipeline configuration
    /// rather than from hardware or filter state.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::UnsupportedTopology { .. } | Self::BufferTooSmall { .. })
    }
}
