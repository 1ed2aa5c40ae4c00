
pub use clap::Parser;
use clap::ValueEnum;

/// Protocol rate resampling numerator for 64 MHz style clocking.
pub const DEFAULT_INNER_RATE: usize = 65;
/// Device rate resampling denominator.
pub const DEFAULT_OUTER_RATE: usize = 96;
/// Chunk length in units of the resampling rates.
pub const DEFAULT_CHUNK_FACTOR: usize = 4;
/// Downlink block size in symbols (four timeslots).
pub const DEFAULT_DOWNLINK_BLOCK: usize = 625;
/// Number of converted chunks held by the inner receive buffer.
pub const DEFAULT_NUM_CHUNKS: usize = 24;
/// Longest burst in symbols.
pub const DEFAULT_MIN_BURST_SYMBOLS: usize = 157;
/// Protocol symbol rate in symbols per second.
pub const SYMBOL_RATE: f64 = 1625e3 / 6.0;

/// Parameters of the receive pipeline.
///
/// The defaults encode one hardware and air interface profile.
/// All of them can be overridden from the command line.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RadioParameters {
    /// Physical RF chains feeding the receiver.
    pub rf_chains: usize,
    /// Logical receive channels.
    pub channels: usize,
    /// Samples per symbol at the protocol rate.
    pub sps: usize,
    /// Interpolation factor of the receive resampler.
    pub inner_rate: usize,
    /// Decimation factor of the receive resampler.
    pub outer_rate: usize,
    pub chunk_factor: usize,
    pub downlink_block: usize,
    pub num_chunks: usize,
    pub min_burst_symbols: usize,
    /// Polyphase filter length per phase.
    pub taps_per_phase: usize,
    /// Filter cutoff relative to the narrower of the two Nyquist bands.
    pub filter_bandwidth: f64,
    /// Frequency translation applied by the resamplers,
    /// in cycles per protocol rate sample.
    pub frequency_offset: f64,
    /// Multiplier applied when converting device integers to floats.
    pub input_scale: f32,
    /// Hardware timestamp of the first receive chunk.
    pub start_timestamp: i64,
}

impl Default for RadioParameters {
    fn default() -> Self {
        Self {
            rf_chains: 2,
            channels: 2,
            sps: 4,
            inner_rate: DEFAULT_INNER_RATE,
            outer_rate: DEFAULT_OUTER_RATE,
            chunk_factor: DEFAULT_CHUNK_FACTOR,
            downlink_block: DEFAULT_DOWNLINK_BLOCK,
            num_chunks: DEFAULT_NUM_CHUNKS,
            min_burst_symbols: DEFAULT_MIN_BURST_SYMBOLS,
            taps_per_phase: 16,
            filter_bandwidth: 0.9,
            frequency_offset: 0.0,
            input_scale: 1.0,
            start_timestamp: 0,
        }
    }
}

impl RadioParameters {
    /// Protocol rate samples produced per receive step.
    pub fn inner_chunk(&self) -> usize {
        self.inner_rate * self.chunk_factor
    }

    /// Device rate samples read per receive step.
    pub fn outer_chunk(&self) -> usize {
        self.outer_rate * self.chunk_factor
    }

    pub fn inner_rx_len(&self) -> usize {
        self.num_chunks * self.inner_chunk() / self.sps.max(1)
    }

    pub fn outer_rx_len(&self) -> usize {
        self.outer_chunk()
    }

    pub fn tx_len(&self) -> usize {
        self.downlink_block * self.sps
    }

    /// Inner receive buffers must hold at least two of the longest bursts.
    pub fn min_rx_len(&self) -> usize {
        self.min_burst_symbols * self.sps * 2
    }

    pub fn protocol_sample_rate(&self) -> f64 {
        SYMBOL_RATE * self.sps as f64
    }

    pub fn device_sample_rate(&self) -> f64 {
        self.protocol_sample_rate() * self.outer_rate as f64 / self.inner_rate as f64
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Source {
    /// Synthetic tone on every channel.
    Tone,
    /// Little-endian CS16 files, one per channel.
    File,
    /// SoapySDR device (requires the soapy feature).
    Soapy,
}

#[derive(Parser)]
pub struct Cli {
    /// Where receive samples come from.
    #[arg(long, value_enum, default_value_t = Source::Tone)]
    pub source: Source,

    /// CS16 input files for --source file, one per channel.
    #[arg(long)]
    pub file: Vec<String>,

    /// SoapySDR device arguments
    /// as pairs like argument_name argument_value...
    /// For example: --sdr-device driver uhd
    #[arg(long, value_delimiter = ' ', num_args = 2..)]
    pub sdr_device: Vec<String>,

    /// Receive center frequency for SDR.
    #[arg(long, default_value_t = 935.2e6)]
    pub sdr_rx_freq: f64,

    /// Receive gain for SDR.
    #[arg(long)]
    pub sdr_rx_gain: Option<f64>,

    /// SoapySDR receive stream arguments.
    #[arg(long, value_delimiter = ' ', num_args = 2..)]
    pub rx_args: Vec<String>,

    /// Samples per symbol at the protocol rate.
    #[arg(long, default_value_t = 4)]
    pub sps: usize,

    /// Frequency translation applied after resampling, in Hertz.
    #[arg(long, default_value_t = 0.0)]
    pub rx_freq_offset: f64,

    /// Tone frequency for --source tone, in Hertz at the device rate.
    #[arg(long, default_value_t = 20e3)]
    pub tone_freq: f64,

    /// Stop after this many receive steps.
    #[arg(long)]
    pub max_pulls: Option<u64>,

    /// Length of the noise level averaging window in timeslots.
    #[arg(long, default_value_t = 32)]
    pub noise_len: usize,

    /// Resampler interpolation factor.
    #[arg(long, default_value_t = DEFAULT_INNER_RATE)]
    pub inner_rate: usize,
    /// Resampler decimation factor.
    #[arg(long, default_value_t = DEFAULT_OUTER_RATE)]
    pub outer_rate: usize,
    /// Downlink block size in symbols.
    #[arg(long, default_value_t = DEFAULT_DOWNLINK_BLOCK)]
    pub downlink_block: usize,
    /// Converted chunks per inner receive buffer.
    #[arg(long, default_value_t = DEFAULT_NUM_CHUNKS)]
    pub num_chunks: usize,
    /// Longest burst in symbols.
    #[arg(long, default_value_t = DEFAULT_MIN_BURST_SYMBOLS)]
    pub min_burst_symbols: usize,
}

impl Cli {
    pub fn radio_parameters(&self) -> RadioParameters {
        let mut params = RadioParameters {
            sps: self.sps,
            inner_rate: self.inner_rate,
            outer_rate: self.outer_rate,
            downlink_block: self.downlink_block,
            num_chunks: self.num_chunks,
            min_burst_symbols: self.min_burst_symbols,
            ..RadioParameters::default()
        };
        params.frequency_offset = self.rx_freq_offset / params.protocol_sample_rate();
        params
    }
}
