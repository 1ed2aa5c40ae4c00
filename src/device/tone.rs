//! Synthetic tone source, useful for testing.

use super::{check_buffers, RadioDevice, RxStatus};

pub struct ToneDevice {
    /// Tone frequency in cycles per device sample.
    frequency: f64,
    /// Peak amplitude per channel in integer units.
    amplitudes: Vec<f64>,
    /// Timestamp the next read is expected at.
    expected_timestamp: Option<i64>,
    /// Number of upcoming reads that will come back short.
    failing_reads: usize,
    reads: u64,
}

impl ToneDevice {
    pub fn new(channels: usize, frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitudes: vec![amplitude; channels],
            expected_timestamp: None,
            failing_reads: 0,
            reads: 0,
        }
    }

    pub fn set_amplitude(&mut self, chan: usize, amplitude: f64) {
        if let Some(a) = self.amplitudes.get_mut(chan) {
            *a = amplitude;
        }
    }

    /// Make the next `reads` reads return half the requested samples.
    pub fn fail_next(&mut self, reads: usize) {
        self.failing_reads = reads;
    }

    /// Number of read calls so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl RadioDevice for ToneDevice {
    fn channels(&self) -> usize {
        self.amplitudes.len()
    }

    fn read_samples(
        &mut self,
        buffers: &mut [Vec<i16>],
        count: usize,
        timestamp: i64,
    ) -> Result<RxStatus, String> {
        self.reads += 1;
        check_buffers(buffers, self.amplitudes.len(), count)?;

        let samples = if self.failing_reads > 0 {
            self.failing_reads -= 1;
            count / 2
        } else {
            count
        };

        // Tone phase is a function of the timestamp so every channel
        // stays coherent however reads are split.
        for (buffer, &amplitude) in buffers.iter_mut().zip(self.amplitudes.iter()) {
            for (i, iq) in buffer[.. 2 * samples].chunks_exact_mut(2).enumerate() {
                let phase = std::f64::consts::TAU * self.frequency * (timestamp + i as i64) as f64;
                iq[0] = (amplitude * phase.cos()).round() as i16;
                iq[1] = (amplitude * phase.sin()).round() as i16;
            }
        }

        let underrun = matches!(self.expected_timestamp, Some(t) if t != timestamp);
        self.expected_timestamp = Some(timestamp + samples as i64);
        Ok(RxStatus { samples, overrun: false, underrun })
    }
}
