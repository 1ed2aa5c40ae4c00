//! Two channel receive through SoapySDR.

use super::{check_buffers, fill_stream, RadioDevice, RxStatus, StreamRead};
use crate::configuration::{Cli, RadioParameters};
use crate::num_complex::Complex;

type StreamType = Complex<i16>;

/// Receive channels used for diversity.
const RX_CHANNELS: [usize; 2] = [0, 1];

/// Timeout of a single stream read in microseconds.
const READ_TIMEOUT_US: i64 = 100000;

/// Overflows tolerated within one read before giving up on it.
const MAX_OVERFLOWS: usize = 4;

/// Convert command line device arguments to soapysdr::Args.
fn convert_args(cli_args: &[String]) -> soapysdr::Args {
    let mut args = soapysdr::Args::new();
    for arg in cli_args.chunks_exact(2) {
        args.set(arg[0].as_str(), arg[1].as_str());
    }
    args
}

/// It is annoying to repeat error handling so do that in a macro.
/// ? could be used but then it could not log which SoapySDR call failed.
macro_rules! soapycheck {
    ($text:literal, $soapysdr_call:expr) => {
        match $soapysdr_call {
            Ok(ret) => { ret },
            Err(err) => {
                log::error!("SoapySDR: Failed to {}: {}", $text, err);
                return Err(err);
            }
        }
    }
}

pub struct SoapyDevice {
    _dev: soapysdr::Device,
    rx: soapysdr::RxStream<StreamType>,
    /// Native format buffers, copied to interleaved integers after each read.
    stream_buffers: [Vec<StreamType>; 2],
    /// Timestamp of the next sample from the stream.
    position: i64,
    /// Overflows reported by the stream since it was opened.
    overflow_count: u64,
}

impl SoapyDevice {
    pub fn init(cli: &Cli, params: &RadioParameters) -> Result<Self, soapysdr::Error> {
        let mut dev = soapycheck!("open SoapySDR device",
            soapysdr::Device::new(convert_args(&cli.sdr_device)));

        let rate = params.device_sample_rate();
        for &ch in RX_CHANNELS.iter() {
            soapycheck!("set RX sample rate",
                dev.set_sample_rate(soapysdr::Direction::Rx, ch, rate));
            soapycheck!("set RX center frequency",
                dev.set_frequency(soapysdr::Direction::Rx, ch, cli.sdr_rx_freq, soapysdr::Args::new()));
            if let Some(gain) = cli.sdr_rx_gain {
                soapycheck!("set RX gain",
                    dev.set_gain(soapysdr::Direction::Rx, ch, gain));
            }
        }
        log::info!("SoapySDR receiving at {} Hz, {} samples/s", cli.sdr_rx_freq, rate);

        let mut rx = soapycheck!("setup RX stream",
            dev.rx_stream_args(&RX_CHANNELS, convert_args(&cli.rx_args)));
        soapycheck!("activate RX stream", rx.activate(None));

        let len = params.outer_chunk();
        Ok(Self {
            _dev: dev,
            rx,
            stream_buffers: [vec![StreamType::default(); len], vec![StreamType::default(); len]],
            position: params.start_timestamp,
            overflow_count: 0,
        })
    }
}

impl RadioDevice for SoapyDevice {
    fn channels(&self) -> usize {
        RX_CHANNELS.len()
    }

    fn read_samples(
        &mut self,
        buffers: &mut [Vec<i16>],
        count: usize,
        timestamp: i64,
    ) -> Result<RxStatus, String> {
        check_buffers(buffers, RX_CHANNELS.len(), count)?;
        for b in self.stream_buffers.iter_mut() {
            if b.len() < count {
                b.resize(count, StreamType::default());
            }
        }

        let [a, b] = &mut self.stream_buffers;
        let rx = &mut self.rx;
        let (samples, overflows) = fill_stream(count, MAX_OVERFLOWS, |offset| {
            match rx.read(&mut [&mut a[offset..count], &mut b[offset..count]], READ_TIMEOUT_US) {
                Ok(n) => StreamRead::Samples(n),
                Err(err) if err.code == soapysdr::ErrorCode::Overflow => StreamRead::Overflow,
                Err(err) if err.code == soapysdr::ErrorCode::Timeout => StreamRead::Timeout,
                Err(err) => StreamRead::Failed(err.to_string()),
            }
        })?;
        let overrun = overflows > 0;
        if overrun {
            self.overflow_count += overflows as u64;
            log::debug!("SoapySDR overflow, {} so far", self.overflow_count);
        }

        for (dst, src) in buffers.iter_mut().zip(self.stream_buffers.iter()) {
            for (iq, s) in dst.chunks_exact_mut(2).zip(src[..samples].iter()) {
                iq[0] = s.re;
                iq[1] = s.im;
            }
        }

        let underrun = timestamp != self.position;
        self.position = timestamp + samples as i64;
        Ok(RxStatus { samples, overrun, underrun })
    }
}
