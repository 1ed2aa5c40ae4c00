//! Sample blocks tagged with air interface time.

use std::cmp::Ordering;

use crate::buffer::SampleBuffer;

/// A burst of samples and the time it was received at.
///
/// Blocks compare by time only, so a later burst is greater.
#[derive(Debug)]
pub struct TimedBlock<T> {
    time: T,
    samples: SampleBuffer,
}

impl<T: Ord + Copy> TimedBlock<T> {
    pub fn new(samples: SampleBuffer, time: T) -> Self {
        Self { time, samples }
    }

    pub fn with_len(len: usize, time: T) -> Self {
        Self::new(SampleBuffer::new(len), time)
    }

    pub fn time(&self) -> T {
        self.time
    }

    pub fn set_time(&mut self, time: T) {
        self.time = time;
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut SampleBuffer {
        &mut self.samples
    }

    pub fn into_samples(self) -> SampleBuffer {
        self.samples
    }
}

impl<T: Ord> PartialEq for TimedBlock<T> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl<T: Ord> Eq for TimedBlock<T> {}

impl<T: Ord> PartialOrd for TimedBlock<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for TimedBlock<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time)
    }
}

/// Per-channel bursts sharing one receive time.
///
/// The number of channels is fixed at construction.
/// Slots may be empty.
#[derive(Debug)]
pub struct MultiChannelBlock<T> {
    time: T,
    channels: Vec<Option<SampleBuffer>>,
}

impl<T: Ord + Copy> MultiChannelBlock<T> {
    /// Block with `chans` empty channel slots.
    pub fn new(chans: usize, time: T) -> Self {
        Self {
            time,
            channels: (0..chans).map(|_| None).collect(),
        }
    }

    /// Block with `chans` zeroed buffers of `len` samples.
    pub fn with_len(len: usize, chans: usize, time: T) -> Self {
        Self {
            time,
            channels: (0..chans).map(|_| Some(SampleBuffer::new(len))).collect(),
        }
    }

    pub fn time(&self) -> T {
        self.time
    }

    pub fn set_time(&mut self, time: T) {
        self.time = time;
    }

    pub fn chans(&self) -> usize {
        self.channels.len()
    }

    /// Buffer of a channel, None if the slot is empty or out of range.
    pub fn channel(&self, chan: usize) -> Option<&SampleBuffer> {
        self.channels.get(chan)?.as_ref()
    }

    pub fn channel_mut(&mut self, chan: usize) -> Option<&mut SampleBuffer> {
        self.channels.get_mut(chan)?.as_mut()
    }

    /// Replace the buffer of a channel.
    ///
    /// The previous buffer is dropped before the new one is stored.
    /// An out of range channel leaves the block untouched
    /// and hands `buffer` back to the caller.
    pub fn set_channel(&mut self, chan: usize, buffer: SampleBuffer) -> Result<(), SampleBuffer> {
        match self.channels.get_mut(chan) {
            Some(slot) => {
                drop(slot.take());
                *slot = Some(buffer);
                Ok(())
            }
            None => Err(buffer),
        }
    }

    /// Move a channel buffer out, leaving the slot empty.
    pub fn take_channel(&mut self, chan: usize) -> Option<SampleBuffer> {
        self.channels.get_mut(chan)?.take()
    }
}

impl<T: Ord> PartialEq for MultiChannelBlock<T> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time
    }
}

impl<T: Ord> Eq for MultiChannelBlock<T> {}

impl<T: Ord> PartialOrd for MultiChannelBlock<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for MultiChannelBlock<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time)
    }
}
