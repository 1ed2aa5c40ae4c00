
use std::ops::Range;

use crate::ComplexSample;
use crate::buffer::SampleBuffer;
use crate::configuration::RadioParameters;
use crate::convert;
use crate::device::RadioDevice;
use crate::error::RadioError;
use crate::resampler::{PolyphaseResampler, RateConverter};

/// Outcome of one receive step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PullStatus {
    /// One chunk was converted into every receive buffer.
    Received,
    /// Receive buffers are full and must be drained first.
    Full,
    /// Pipeline is not initialized.
    Closed,
}

/// Two-branch diversity receiver.
///
/// Reads device rate chunks from every channel at once, converts them to
/// the protocol rate and appends them to per-channel receive buffers.
/// All channels share one write cursor so they stay sample aligned.
pub struct DiversityRx<D: RadioDevice> {
    params: RadioParameters,
    device: D,
    /// Interleaved integer samples from the device, one buffer per channel.
    convert_recv: Vec<Vec<i16>>,
    /// Device rate samples of the channel being converted,
    /// with a guard for resampler history.
    outer_recv: SampleBuffer,
    /// Protocol rate receive buffers, one per channel.
    recv: Vec<SampleBuffer>,
    /// Transmit buffers, not resampled.
    send: Vec<SampleBuffer>,
    convert_send: Vec<Vec<i16>>,
    /// Receive resamplers, one per channel.
    dnsamplers: Vec<Box<dyn RateConverter>>,
    /// End of valid samples in every receive buffer.
    recv_cursor: usize,
    /// Hardware timestamp of the next chunk to read.
    read_timestamp: i64,
    underrun: bool,
    overrun: bool,
    resample_error: bool,
    resample_errors: u64,
}

impl<D: RadioDevice> DiversityRx<D> {
    /// Create an uninitialized receiver. Nothing is allocated until `init`.
    pub fn new(params: RadioParameters, device: D) -> Self {
        Self {
            params,
            device,
            convert_recv: Vec::new(),
            outer_recv: SampleBuffer::default(),
            recv: Vec::new(),
            send: Vec::new(),
            convert_send: Vec::new(),
            dnsamplers: Vec::new(),
            recv_cursor: 0,
            read_timestamp: params.start_timestamp,
            underrun: false,
            overrun: false,
            resample_error: false,
            resample_errors: 0,
        }
    }

    /// Allocate buffers and set up polyphase resamplers.
    pub fn init(&mut self) -> Result<(), RadioError> {
        let p = self.params;
        self.init_with(|_chan| {
            Box::new(
                PolyphaseResampler::new(p.inner_rate, p.outer_rate, p.taps_per_phase)
                    .with_bandwidth(p.filter_bandwidth)
                    .with_frequency_offset(p.frequency_offset),
            )
        })
    }

    /// Allocate buffers with resamplers made by `make_converter` for each channel.
    ///
    /// On failure nothing stays allocated.
    pub fn init_with<F>(&mut self, mut make_converter: F) -> Result<(), RadioError>
    where
        F: FnMut(usize) -> Box<dyn RateConverter>,
    {
        let p = self.params;
        self.close();

        if p.rf_chains != 2 || p.channels != 2 {
            let err = RadioError::UnsupportedTopology { rf_chains: p.rf_chains, channels: p.channels };
            log::error!("{}", err);
            return Err(err);
        }
        if self.device.channels() != p.channels {
            let err = RadioError::UnsupportedTopology { rf_chains: p.rf_chains, channels: self.device.channels() };
            log::error!("{}", err);
            return Err(err);
        }

        let inner_rx_len = p.inner_rx_len();
        let outer_rx_len = p.outer_rx_len();
        let tx_len = p.tx_len();

        if inner_rx_len < p.min_rx_len() {
            let err = RadioError::BufferTooSmall { size: inner_rx_len, required: p.min_rx_len() };
            log::error!("{}", err);
            return Err(err);
        }

        // Nothing is stored in self until every resampler is initialized
        let mut dnsamplers = Vec::with_capacity(p.channels);
        for chan in 0..p.channels {
            let mut dnsampler = make_converter(chan);
            if let Err(source) = dnsampler.init() {
                let err = RadioError::ResamplerInit { channel: chan, source };
                log::error!("{}", err);
                return Err(err);
            }
            dnsamplers.push(dnsampler);
        }

        let history = dnsamplers.iter().map(|d| d.required_history()).max().unwrap_or(0);

        self.convert_recv = (0..p.channels).map(|_| vec![0; outer_rx_len * 2]).collect();
        self.recv = (0..p.channels).map(|_| SampleBuffer::new(inner_rx_len)).collect();
        self.send = (0..p.channels).map(|_| SampleBuffer::new(tx_len)).collect();
        self.convert_send = (0..p.channels).map(|_| vec![0; tx_len * 2]).collect();
        self.outer_recv = SampleBuffer::with_guard(outer_rx_len, history);
        self.dnsamplers = dnsamplers;

        self.recv_cursor = 0;
        self.read_timestamp = p.start_timestamp;
        self.underrun = false;
        self.overrun = false;
        self.resample_error = false;
        self.resample_errors = 0;

        log::info!(
            "diversity receiver: {} channels, {}:{} resampling, {} sample receive buffers",
            p.channels, p.inner_rate, p.outer_rate, inner_rx_len
        );
        Ok(())
    }

    /// Release all buffers and resamplers. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.outer_recv = SampleBuffer::default();
        self.dnsamplers.clear();
        self.convert_recv.clear();
        self.recv.clear();
        self.send.clear();
        self.convert_send.clear();
        self.recv_cursor = 0;
    }

    pub fn is_initialized(&self) -> bool {
        !self.dnsamplers.is_empty()
    }

    /// Receive one timestamped chunk from the device.
    pub fn pull_buffer(&mut self) -> Result<PullStatus, RadioError> {
        if !self.is_initialized() {
            return Ok(PullStatus::Closed);
        }

        let inner_chunk = self.params.inner_chunk();
        let outer_chunk = self.params.outer_chunk();

        if self.recv_cursor + inner_chunk > self.ring_capacity() {
            return Ok(PullStatus::Full);
        }

        // Outer buffer access size is fixed
        let status = match self.device.read_samples(&mut self.convert_recv, outer_chunk, self.read_timestamp) {
            Ok(status) => status,
            Err(msg) => {
                log::error!("Receive error: {}", msg);
                return Err(RadioError::DeviceRead { expected: outer_chunk, actual: 0 });
            }
        };
        // Device flags are kept even when the read fails
        self.underrun |= status.underrun;
        self.overrun |= status.overrun;
        if status.samples != outer_chunk {
            let err = RadioError::DeviceRead { expected: outer_chunk, actual: status.samples };
            log::error!("{}", err);
            return Err(err);
        }

        let cursor = self.recv_cursor;
        for (chan, dnsampler) in self.dnsamplers.iter_mut().enumerate() {
            convert::convert_short_float(&mut self.outer_recv, &self.convert_recv[chan], self.params.input_scale);

            // Guard may be longer than this resampler needs
            let input = self.outer_recv.full_mut();
            let start = input.len() - outer_chunk - dnsampler.required_history();

            // Write to the end of the inner receive buffer
            let output = &mut self.recv[chan][cursor .. cursor + inner_chunk];
            if let Err(source) = dnsampler.rotate(&mut input[start..], output) {
                log::warn!("{}", RadioError::Resampling { channel: chan, source });
                self.resample_error = true;
                self.resample_errors += 1;
            }
        }

        self.read_timestamp += outer_chunk as i64;
        self.recv_cursor += inner_chunk;
        Ok(PullStatus::Received)
    }

    /// Received protocol rate samples of a channel not yet drained.
    pub fn received(&self, chan: usize) -> Option<&[ComplexSample]> {
        self.recv.get(chan).map(|buf| &buf[.. self.recv_cursor])
    }

    /// A range of received samples of a channel.
    /// None if the channel does not exist or the range is past the cursor.
    pub fn rx_window(&self, chan: usize, range: Range<usize>) -> Option<&[ComplexSample]> {
        self.received(chan)?.get(range)
    }

    /// Discard the first `count` received samples of every channel,
    /// moving the rest to the start of the buffers.
    /// Returns the number of samples discarded.
    pub fn drain(&mut self, count: usize) -> usize {
        let count = count.min(self.recv_cursor);
        for buf in self.recv.iter_mut() {
            buf.copy_within(count .. self.recv_cursor, 0);
        }
        self.recv_cursor -= count;
        count
    }

    /// Write position shared by all receive buffers.
    pub fn cursor(&self) -> usize {
        self.recv_cursor
    }

    /// Length of each receive buffer, zero when closed.
    pub fn ring_capacity(&self) -> usize {
        self.recv.first().map_or(0, |buf| buf.len())
    }

    /// Hardware timestamp of the next chunk to be read.
    pub fn read_timestamp(&self) -> i64 {
        self.read_timestamp
    }

    /// Whether any read reported underrun since the last call.
    pub fn take_underrun(&mut self) -> bool {
        std::mem::take(&mut self.underrun)
    }

    /// Whether any read reported overrun since the last call.
    pub fn take_overrun(&mut self) -> bool {
        std::mem::take(&mut self.overrun)
    }

    /// Whether any resampler failed since the last call.
    pub fn take_resample_error(&mut self) -> bool {
        std::mem::take(&mut self.resample_error)
    }

    /// Total number of resampler failures.
    pub fn resample_errors(&self) -> u64 {
        self.resample_errors
    }

    pub fn send_buffer_mut(&mut self, chan: usize) -> Option<&mut SampleBuffer> {
        self.send.get_mut(chan)
    }

    pub fn convert_send_buffer_mut(&mut self, chan: usize) -> Option<&mut [i16]> {
        self.convert_send.get_mut(chan).map(|b| &mut b[..])
    }

    pub fn params(&self) -> &RadioParameters {
        &self.params
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: RadioDevice> Drop for DiversityRx<D> {
    fn drop(&mut self) {
        self.close();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{RxStatus, ToneDevice};
    use crate::resampler::ResampleError;

    fn tone_rx(params: RadioParameters) -> DiversityRx<ToneDevice> {
        DiversityRx::new(params, ToneDevice::new(2, 0.01, 1000.0))
    }

    /// Writes the channel number into every output sample.
    struct MarkConverter {
        chan: usize,
        fail_rotate: bool,
        fail_init: bool,
    }

    impl RateConverter for MarkConverter {
        fn init(&mut self) -> Result<(), ResampleError> {
            if self.fail_init {
                Err(ResampleError::NotInitialized)
            } else {
                Ok(())
            }
        }

        fn rotate(&mut self, input: &mut [ComplexSample], output: &mut [ComplexSample]) -> Result<(), ResampleError> {
            assert_eq!(input.len(), 384 + self.required_history());
            if self.fail_rotate {
                return Err(ResampleError::NotInitialized);
            }
            for out in output.iter_mut() {
                *out = ComplexSample::new(self.chan as f32 + 1.0, 0.0);
            }
            Ok(())
        }

        fn required_history(&self) -> usize {
            4 + self.chan
        }
    }

    /// Device replaying scripted statuses.
    struct ScriptedDevice {
        statuses: Vec<RxStatus>,
        reads: usize,
    }

    impl RadioDevice for ScriptedDevice {
        fn channels(&self) -> usize {
            2
        }

        fn read_samples(&mut self, _buffers: &mut [Vec<i16>], _count: usize, _timestamp: i64) -> Result<RxStatus, String> {
            let status = self.statuses.get(self.reads).copied().ok_or("no more reads".to_string());
            self.reads += 1;
            status
        }
    }

    #[test]
    fn init_sizes_buffers() {
        let mut rx = tone_rx(RadioParameters::default());
        rx.init().unwrap();
        assert!(rx.is_initialized());
        assert_eq!(rx.ring_capacity(), 1560);
        assert!(rx.ring_capacity() >= 2 * 157 * 4);
        assert_eq!(rx.send_buffer_mut(1).unwrap().len(), 2500);
        assert_eq!(rx.convert_send_buffer_mut(1).unwrap().len(), 5000);
        assert!(rx.send_buffer_mut(2).is_none());
        assert_eq!(rx.received(0).unwrap().len(), 0);
    }

    #[test]
    fn unsupported_topology_allocates_nothing() {
        for (rf_chains, channels) in [(1, 1), (2, 1), (1, 2), (4, 2), (2, 3)] {
            let params = RadioParameters { rf_chains, channels, ..RadioParameters::default() };
            let mut rx = tone_rx(params);
            let err = rx.init().unwrap_err();
            assert!(matches!(err, RadioError::UnsupportedTopology { .. }));
            assert!(err.is_config());
            assert!(!rx.is_initialized());
            assert_eq!(rx.ring_capacity(), 0);
            assert_eq!(rx.pull_buffer().unwrap(), PullStatus::Closed);
            assert_eq!(rx.device().reads(), 0);
        }
    }

    #[test]
    fn single_channel_device_is_rejected() {
        let mut rx = DiversityRx::new(RadioParameters::default(), ToneDevice::new(1, 0.01, 1000.0));
        let err = rx.init().unwrap_err();
        assert!(matches!(err, RadioError::UnsupportedTopology { channels: 1, .. }));
        assert!(!rx.is_initialized());
        assert_eq!(rx.ring_capacity(), 0);
        assert_eq!(rx.pull_buffer().unwrap(), PullStatus::Closed);
        assert_eq!(rx.device().reads(), 0);
    }

    #[test]
    fn undersized_buffer_is_rejected() {
        // 24 * 260 / 8 = 780 samples, less than two 157 symbol bursts at 8 sps
        let params = RadioParameters { sps: 8, ..RadioParameters::default() };
        let mut rx = tone_rx(params);
        assert!(matches!(
            rx.init(),
            Err(RadioError::BufferTooSmall { size: 780, required: 2512 })
        ));
        assert_eq!(rx.ring_capacity(), 0);
    }

    #[test]
    fn failed_resampler_init_rolls_back() {
        let mut rx = tone_rx(RadioParameters::default());
        rx.init().unwrap();
        let err = rx.init_with(|chan| Box::new(MarkConverter { chan, fail_rotate: false, fail_init: chan == 1 }));
        assert!(matches!(err, Err(RadioError::ResamplerInit { channel: 1, .. })));
        assert!(!rx.is_initialized());
        assert_eq!(rx.ring_capacity(), 0);
        assert!(rx.received(0).is_none());

        // Recovers on a later init
        rx.init().unwrap();
        assert_eq!(rx.ring_capacity(), 1560);
    }

    #[test]
    fn pulls_advance_timestamp_and_cursor_until_full() {
        let params = RadioParameters { start_timestamp: 1000, ..RadioParameters::default() };
        let mut rx = tone_rx(params);
        rx.init().unwrap();

        for n in 1..=6 {
            assert_eq!(rx.pull_buffer().unwrap(), PullStatus::Received);
            assert_eq!(rx.read_timestamp(), 1000 + 384 * n);
            assert_eq!(rx.cursor(), 260 * n as usize);
        }

        // 1560 + 260 would overflow
        assert_eq!(rx.pull_buffer().unwrap(), PullStatus::Full);
        assert_eq!(rx.device().reads(), 6);
        assert_eq!(rx.read_timestamp(), 1000 + 384 * 6);
        assert_eq!(rx.cursor(), 1560);
        assert!(!rx.take_underrun());
        assert!(!rx.take_resample_error());

        assert_eq!(rx.drain(260), 260);
        assert_eq!(rx.pull_buffer().unwrap(), PullStatus::Received);
        assert_eq!(rx.cursor(), 1560);
    }

    #[test]
    fn short_read_changes_nothing() {
        let mut rx = tone_rx(RadioParameters::default());
        rx.init().unwrap();
        rx.pull_buffer().unwrap();

        rx.device_mut().fail_next(1);
        let err = rx.pull_buffer().unwrap_err();
        assert!(matches!(err, RadioError::DeviceRead { expected: 384, actual: 192 }));
        assert_eq!(rx.cursor(), 260);
        assert_eq!(rx.read_timestamp(), 384);

        // Not retried internally, the next call reads again
        assert_eq!(rx.device().reads(), 2);
        assert_eq!(rx.pull_buffer().unwrap(), PullStatus::Received);
        assert_eq!(rx.cursor(), 520);
        // The short read covered 192 samples from 384 so the retry at 384 is not contiguous
        assert!(rx.take_underrun());
    }

    #[test]
    fn device_error_is_a_read_error() {
        let device = ScriptedDevice { statuses: Vec::new(), reads: 0 };
        let mut rx = DiversityRx::new(RadioParameters::default(), device);
        rx.init().unwrap();
        assert!(matches!(rx.pull_buffer(), Err(RadioError::DeviceRead { actual: 0, .. })));
        assert_eq!(rx.cursor(), 0);
        assert_eq!(rx.read_timestamp(), 0);
    }

    #[test]
    fn resampling_error_spares_other_channel() {
        let mut rx = tone_rx(RadioParameters::default());
        rx.init_with(|chan| Box::new(MarkConverter { chan, fail_rotate: chan == 0, fail_init: false }))
            .unwrap();

        assert_eq!(rx.pull_buffer().unwrap(), PullStatus::Received);
        assert_eq!(rx.cursor(), 260);
        assert!(rx.received(0).unwrap().iter().all(|s| *s == ComplexSample::new(0.0, 0.0)));
        assert!(rx.received(1).unwrap().iter().all(|s| *s == ComplexSample::new(2.0, 0.0)));
        assert_eq!(rx.resample_errors(), 1);
        assert!(rx.take_resample_error());
        assert!(!rx.take_resample_error());
    }

    #[test]
    fn flags_are_sticky_until_taken() {
        let status = |underrun, overrun| RxStatus { samples: 384, overrun, underrun };
        let device = ScriptedDevice {
            statuses: vec![status(true, false), status(false, false), status(false, true)],
            reads: 0,
        };
        let mut rx = DiversityRx::new(RadioParameters::default(), device);
        rx.init().unwrap();

        rx.pull_buffer().unwrap();
        rx.pull_buffer().unwrap();
        assert!(rx.take_underrun());
        assert!(!rx.take_underrun());
        assert!(!rx.take_overrun());

        rx.pull_buffer().unwrap();
        assert!(rx.take_overrun());
        assert!(!rx.take_overrun());
    }

    #[test]
    fn overrun_on_failed_read_is_kept() {
        let device = ScriptedDevice {
            statuses: vec![
                RxStatus { samples: 0, overrun: true, underrun: false },
                RxStatus { samples: 384, overrun: false, underrun: false },
            ],
            reads: 0,
        };
        let mut rx = DiversityRx::new(RadioParameters::default(), device);
        rx.init().unwrap();

        assert!(matches!(rx.pull_buffer(), Err(RadioError::DeviceRead { actual: 0, .. })));
        assert_eq!(rx.cursor(), 0);
        assert_eq!(rx.read_timestamp(), 0);
        assert!(rx.take_overrun());
        assert!(!rx.take_overrun());

        assert_eq!(rx.pull_buffer().unwrap(), PullStatus::Received);
        assert!(!rx.take_overrun());
    }

    #[test]
    fn reinit_clears_resample_error_count() {
        let mut rx = tone_rx(RadioParameters::default());
        rx.init_with(|chan| Box::new(MarkConverter { chan, fail_rotate: true, fail_init: false }))
            .unwrap();
        rx.pull_buffer().unwrap();
        assert_eq!(rx.resample_errors(), 2);

        rx.close();
        rx.init().unwrap();
        assert_eq!(rx.resample_errors(), 0);
        assert!(!rx.take_resample_error());
    }

    #[test]
    fn channels_stay_aligned() {
        let mut rx = tone_rx(RadioParameters::default());
        rx.device_mut().set_amplitude(1, 500.0);
        rx.init().unwrap();
        for _ in 0..4 {
            rx.pull_buffer().unwrap();
        }
        let a = rx.rx_window(0, 260..1040).unwrap();
        let b = rx.rx_window(1, 260..1040).unwrap();
        assert!(a.iter().any(|s| s.norm() > 900.0));
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((*x * 0.5 - *y).norm() < 2.0, "{} {}", x, y);
        }
        assert!(rx.rx_window(0, 1000..1100).is_none());
        assert!(rx.rx_window(2, 0..10).is_none());
    }

    #[test]
    fn drain_moves_remaining_samples() {
        let mut rx = tone_rx(RadioParameters::default());
        rx.init().unwrap();
        rx.pull_buffer().unwrap();
        rx.pull_buffer().unwrap();
        let tail = rx.rx_window(0, 100..520).unwrap().to_vec();

        assert_eq!(rx.drain(100), 100);
        assert_eq!(rx.cursor(), 420);
        assert_eq!(rx.received(0).unwrap(), &tail[..]);
        assert_eq!(rx.drain(1000), 420);
        assert_eq!(rx.cursor(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let mut rx = tone_rx(RadioParameters::default());
        rx.close();
        rx.init().unwrap();
        rx.pull_buffer().unwrap();
        rx.close();
        rx.close();
        assert!(!rx.is_initialized());
        assert_eq!(rx.cursor(), 0);
        rx.init().unwrap();
        assert_eq!(rx.read_timestamp(), 0);
    }
}
