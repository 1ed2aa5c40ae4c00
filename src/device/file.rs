//! Playback of recorded CS16 files, one file per channel.

use std::fs::File;
use std::io::{self, BufReader, Read};

use byteorder::{ByteOrder, LittleEndian};

use super::{check_buffers, RadioDevice, RxStatus};

/// Bytes per complex int16 sample.
const BYTES_PER_SAMPLE: usize = 4;

pub struct FileDevice {
    paths: Vec<String>,
    readers: Vec<BufReader<File>>,
    /// Raw bytes of the current read, reused between reads.
    bytes: Vec<u8>,
    /// Timestamp of the next unread sample, set by the first read.
    position: Option<i64>,
}

impl FileDevice {
    pub fn open(paths: &[String]) -> io::Result<Self> {
        let readers = paths
            .iter()
            .map(|path| File::open(path).map(|f| BufReader::with_capacity(1 << 20, f)))
            .collect::<io::Result<Vec<_>>>()?;
        log::info!("reading CS16 samples from {}", paths.join(", "));
        Ok(Self {
            paths: paths.to_vec(),
            readers,
            bytes: Vec::new(),
            position: None,
        })
    }

    /// Fill `bytes` as far as the file allows.
    fn read_full(reader: &mut BufReader<File>, bytes: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < bytes.len() {
            match reader.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl RadioDevice for FileDevice {
    fn channels(&self) -> usize {
        self.readers.len()
    }

    fn read_samples(
        &mut self,
        buffers: &mut [Vec<i16>],
        count: usize,
        timestamp: i64,
    ) -> Result<RxStatus, String> {
        check_buffers(buffers, self.readers.len(), count)?;
        self.bytes.resize(count * BYTES_PER_SAMPLE, 0);

        let mut samples = count;
        for ((reader, buffer), path) in self.readers.iter_mut().zip(buffers.iter_mut()).zip(self.paths.iter()) {
            let n = Self::read_full(reader, &mut self.bytes)
                .map_err(|e| format!("read error in {}: {}", path, e))?;
            let got = n / BYTES_PER_SAMPLE;
            LittleEndian::read_i16_into(&self.bytes[.. got * BYTES_PER_SAMPLE], &mut buffer[.. got * 2]);
            if got < samples {
                log::info!("end of file: {}", path);
                samples = got;
            }
        }

        let underrun = matches!(self.position, Some(p) if p != timestamp);
        self.position = Some(timestamp + samples as i64);
        Ok(RxStatus { samples, overrun: false, underrun })
    }
}
