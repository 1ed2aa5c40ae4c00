//! Sources of raw receive samples.

pub mod file;
pub mod tone;
#[cfg(feature = "soapy")]
pub mod soapy;

pub use file::FileDevice;
pub use tone::ToneDevice;
#[cfg(feature = "soapy")]
pub use soapy::SoapyDevice;

/// Result of one device read.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RxStatus {
    /// Complex samples written to every channel buffer.
    pub samples: usize,
    /// Device dropped samples before this read.
    pub overrun: bool,
    /// Requested timestamp did not follow on from the previous read.
    pub underrun: bool,
}

/// Multi-channel receive device with hardware timestamps.
pub trait RadioDevice: Send {
    /// Number of receive channels delivered per read.
    fn channels(&self) -> usize;

    /// Read `count` samples per channel starting at `timestamp`.
    ///
    /// `buffers` has one interleaved I/Q buffer of at least `2 * count`
    /// values per channel. A short count or an error means the read failed.
    fn read_samples(
        &mut self,
        buffers: &mut [Vec<i16>],
        count: usize,
        timestamp: i64,
    ) -> Result<RxStatus, String>;
}

/// Result of one call into a streaming driver.
#[cfg_attr(not(feature = "soapy"), allow(dead_code))]
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum StreamRead {
    Samples(usize),
    Overflow,
    Timeout,
    Failed(String),
}

/// Collect `count` samples from a stream that may return fewer per call.
///
/// `read(offset)` reads into the buffers starting at `offset`.
/// An overflow discards what was gathered, since the samples after it
/// are not contiguous, and reading starts over. After `max_overflows`
/// overflows, a timeout or an empty read the samples so far are returned.
/// A failure is an error only if nothing was read yet.
/// Returns the number of samples read and the number of overflows.
#[cfg_attr(not(feature = "soapy"), allow(dead_code))]
pub(crate) fn fill_stream<F>(count: usize, max_overflows: usize, mut read: F) -> Result<(usize, usize), String>
where
    F: FnMut(usize) -> StreamRead,
{
    let mut samples = 0;
    let mut overflows = 0;
    while samples < count {
        match read(samples) {
            StreamRead::Samples(0) | StreamRead::Timeout => break,
            StreamRead::Samples(n) => samples += n.min(count - samples),
            StreamRead::Overflow => {
                overflows += 1;
                samples = 0;
                if overflows >= max_overflows {
                    break;
                }
            }
            StreamRead::Failed(msg) if samples == 0 => return Err(msg),
            StreamRead::Failed(msg) => {
                log::warn!("read failed after {} samples: {}", samples, msg);
                break;
            }
        }
    }
    Ok((samples, overflows))
}

/// Check buffers are usable for a read of `count` samples.
fn check_buffers(buffers: &[Vec<i16>], channels: usize, count: usize) -> Result<(), String> {
    if buffers.len() < channels {
        return Err(format!("{} buffers given for {} channels", buffers.len(), channels));
    }
    if let Some(short) = buffers.iter().take(channels).find(|b| b.len() < 2 * count) {
        return Err(format!("buffer of {} values cannot hold {} samples", short.len(), count));
    }
    Ok(())
}
