use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use trxglue::configuration::{self, Parser, RadioParameters, Source};
use trxglue::device::{self, RadioDevice};
use trxglue::queue::BurstQueue;
use trxglue::rx_dsp::{DiversityRx, PullStatus};
use trxglue::rxthings::SlotAssembler;
use trxglue::timing::FrameTime;

/// Integer amplitude of the synthetic tone.
const TONE_AMPLITUDE: f64 = 8000.0;

fn main() {
    env_logger::init();
    let cli = configuration::Cli::parse();
    let params = cli.radio_parameters();

    let ok = match cli.source {
        Source::Tone => {
            let tone_freq = cli.tone_freq / params.device_sample_rate();
            run(&cli, params, device::ToneDevice::new(params.channels, tone_freq, TONE_AMPLITUDE))
        },
        Source::File => match device::FileDevice::open(&cli.file) {
            Ok(dev) => run(&cli, params, dev),
            Err(err) => {
                log::error!("Failed to open input files: {}", err);
                false
            },
        },
        Source::Soapy => run_soapy(&cli, params),
    };
    if !ok {
        std::process::exit(1);
    }
}

#[cfg(feature = "soapy")]
fn run_soapy(cli: &configuration::Cli, params: RadioParameters) -> bool {
    match device::SoapyDevice::init(cli, &params) {
        Ok(dev) => run(cli, params, dev),
        Err(_) => false,
    }
}

#[cfg(not(feature = "soapy"))]
fn run_soapy(_cli: &configuration::Cli, _params: RadioParameters) -> bool {
    log::error!("SoapySDR support was not compiled in, rebuild with --features soapy");
    false
}

/// Drive the receiver on this thread and consume bursts on another.
fn run<D: RadioDevice>(cli: &configuration::Cli, params: RadioParameters, device: D) -> bool {
    let queue = Arc::new(BurstQueue::new());
    let running = Arc::new(AtomicBool::new(true));

    let consumer = {
        let queue = Arc::clone(&queue);
        let running = Arc::clone(&running);
        thread::spawn(move || consume(&queue, &running))
    };

    let mut rx = DiversityRx::new(params, device);
    if rx.init().is_err() {
        running.store(false, Ordering::Relaxed);
        join_consumer(consumer);
        return false;
    }
    let mut assembler = SlotAssembler::new(&params, FrameTime::default(), cli.noise_len, Arc::clone(&queue));

    let mut error_count = 0;
    let mut pulls: u64 = 0;

    loop {
        if cli.max_pulls.is_some_and(|max| pulls >= max) {
            break;
        }
        match rx.pull_buffer() {
            Ok(PullStatus::Received) => {
                error_count = 0;
                pulls += 1;
            },
            Ok(PullStatus::Full) => {
                if assembler.process(&mut rx) == 0 {
                    log::warn!("Receive buffer full without a complete timeslot, discarding");
                    rx.drain(rx.cursor());
                }
            },
            Ok(PullStatus::Closed) => break,
            Err(err) => {
                error_count += 1;
                log::warn!("Error receiving from SDR ({}): {}", error_count, err);
                // If too many reads result in an error with no valid reads
                // in between, assume the SDR is broken and stop.
                if error_count >= 10 {
                    break
                }
            },
        }
        assembler.process(&mut rx);

        if rx.take_overrun() {
            log::warn!("Receive overrun at {}", rx.read_timestamp());
        }
        if rx.take_underrun() {
            log::warn!("Receive underrun at {}", rx.read_timestamp());
        }
        if rx.take_resample_error() {
            log::warn!("Resampling errors so far: {}", rx.resample_errors());
        }
        if pulls > 0 && pulls % 1000 == 0 && error_count == 0 {
            log::info!(
                "{} chunks received, noise levels {:.1} {:.1}",
                pulls,
                assembler.noise_level(0).unwrap_or(0.0),
                assembler.noise_level(1).unwrap_or(0.0),
            );
        }
    }

    running.store(false, Ordering::Relaxed);
    match join_consumer(consumer) {
        Some((delivered, stale)) => {
            log::info!("{} chunks received, {} bursts delivered, {} stale", pulls, delivered, stale);
            true
        },
        None => false,
    }
}

/// Wait for the consumer thread. None if it panicked.
fn join_consumer(consumer: thread::JoinHandle<(u64, u64)>) -> Option<(u64, u64)> {
    match consumer.join() {
        Ok(counts) => Some(counts),
        Err(_) => {
            log::error!("Burst consumer panicked");
            None
        },
    }
}

/// Slot driven consumer. Follows a slot clock, delivering the burst of
/// each slot and dropping bursts that are older than the clock.
fn consume(queue: &BurstQueue<FrameTime>, running: &AtomicBool) -> (u64, u64) {
    let mut clock: Option<FrameTime> = None;
    let mut delivered = 0;
    let mut stale = 0;

    while running.load(Ordering::Relaxed) || !queue.is_empty() {
        let Some(earliest) = queue.next_time_timeout(Duration::from_millis(100)) else {
            continue
        };
        let target = clock.map_or(earliest, |c| c.max(earliest));

        while let Some(burst) = queue.get_stale_burst(target) {
            log::debug!("Dropping stale burst {}", burst.time());
            stale += 1;
        }
        if let Some(burst) = queue.get_current_burst(target) {
            log::debug!("Burst {} energy {:.1}", burst.time(), burst.samples().energy());
            delivered += 1;
            clock = Some(target.next_slot());
        }
    }
    (delivered, stale)
}


#[cfg(test)]
mod tests {
    use super::*;
    use trxglue::timed::TimedBlock;

    #[test]
    fn consumer_panic_is_reported() {
        let consumer = thread::spawn(|| -> (u64, u64) { panic!("consumer failed") });
        assert_eq!(join_consumer(consumer), None);
    }

    #[test]
    fn consumer_delivers_and_drops_stale() {
        let queue = Arc::new(BurstQueue::new());
        let running = Arc::new(AtomicBool::new(true));
        for slot in [1, 2, 3] {
            queue.push(TimedBlock::with_len(4, FrameTime::new(10, slot)));
        }
        let consumer = {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            thread::spawn(move || consume(&queue, &running))
        };
        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        // Slot 2 arrives after the clock has moved past it
        queue.push(TimedBlock::with_len(4, FrameTime::new(10, 2)));
        running.store(false, Ordering::Relaxed);
        assert_eq!(join_consumer(consumer), Some((3, 1)));
        assert!(queue.is_empty());
    }
}
