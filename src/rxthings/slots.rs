//! Cutting received samples into timeslot bursts.

use std::sync::Arc;

use crate::configuration::RadioParameters;
use crate::device::RadioDevice;
use crate::noise::NoiseLevel;
use crate::queue::BurstQueue;
use crate::rx_dsp::DiversityRx;
use crate::timed::{MultiChannelBlock, TimedBlock};
use crate::timing::FrameTime;
use crate::Sample;

/// Timeslots per downlink block.
const SLOTS_PER_BLOCK: usize = 4;

/// Splits the receive buffers into consecutive timeslots, keeps a noise
/// estimate per channel and queues the best channel of every slot.
pub struct SlotAssembler {
    /// Samples per downlink block.
    block_len: usize,
    /// Time of the next slot.
    time: FrameTime,
    /// Slots assembled so far, used to spread the fractional slot length.
    slot_count: u64,
    /// Noise estimate per channel.
    noise: Vec<NoiseLevel>,
    queue: Arc<BurstQueue<FrameTime>>,
}

impl SlotAssembler {
    pub fn new(
        params: &RadioParameters,
        start: FrameTime,
        noise_len: usize,
        queue: Arc<BurstQueue<FrameTime>>,
    ) -> Self {
        Self {
            block_len: params.downlink_block * params.sps,
            time: start,
            slot_count: 0,
            noise: (0..params.channels).map(|_| NoiseLevel::new(noise_len)).collect(),
            queue,
        }
    }

    /// Length of the next slot in samples.
    ///
    /// A downlink block is four slots. When it does not divide evenly
    /// the extra samples go to the last slot of the block.
    pub fn slot_len(&self) -> usize {
        let k = (self.slot_count % SLOTS_PER_BLOCK as u64) as usize;
        (k + 1) * self.block_len / SLOTS_PER_BLOCK - k * self.block_len / SLOTS_PER_BLOCK
    }

    /// Time of the next slot.
    pub fn time(&self) -> FrameTime {
        self.time
    }

    /// Noise estimate of a channel over the whole averaging window.
    pub fn noise_level(&self, chan: usize) -> Option<Sample> {
        self.noise.get(chan).map(NoiseLevel::average)
    }

    /// Queue every complete slot in the receive buffers.
    /// Returns the number of slots queued.
    pub fn process<D: RadioDevice>(&mut self, rx: &mut DiversityRx<D>) -> usize {
        let mut slots = 0;
        loop {
            let len = self.slot_len();
            if len == 0 || rx.cursor() < len {
                break;
            }
            let block = self.assemble(rx, len);
            rx.drain(len);

            if let Some(burst) = self.select(block) {
                log::trace!("slot {} from {} samples", burst.time(), burst.samples().len());
                self.queue.push(burst);
            }
            self.time = self.time.next_slot();
            self.slot_count += 1;
            slots += 1;
        }
        slots
    }

    /// Copy one slot of every channel out of the receive buffers.
    fn assemble<D: RadioDevice>(&self, rx: &DiversityRx<D>, len: usize) -> MultiChannelBlock<FrameTime> {
        let mut block = MultiChannelBlock::with_len(len, self.noise.len(), self.time);
        for chan in 0..block.chans() {
            if let (Some(dst), Some(src)) = (block.channel_mut(chan), rx.rx_window(chan, 0..len)) {
                dst.copy_from_slice(src);
            }
        }
        block
    }

    /// Selection diversity: keep the channel with the best power to noise ratio,
    /// then fold every channel's power into its noise estimate.
    fn select(&mut self, mut block: MultiChannelBlock<FrameTime>) -> Option<TimedBlock<FrameTime>> {
        let mut best: Option<(usize, Sample)> = None;
        for (chan, noise) in self.noise.iter_mut().enumerate() {
            let Some(buf) = block.channel(chan) else { continue };
            let energy = buf.energy();
            let floor = noise.average_written();
            let score = if floor > 0.0 { energy / floor } else { energy };
            noise.insert(energy);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((chan, score));
            }
        }
        let (chan, _) = best?;
        let time = block.time();
        block.take_channel(chan).map(|samples| TimedBlock::new(samples, time))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ToneDevice;

    fn setup(sps: usize) -> (DiversityRx<ToneDevice>, SlotAssembler, Arc<BurstQueue<FrameTime>>) {
        let params = RadioParameters { sps, ..RadioParameters::default() };
        let mut rx = DiversityRx::new(params, ToneDevice::new(2, 0.02, 1000.0));
        rx.init().unwrap();
        let queue = Arc::new(BurstQueue::new());
        let assembler = SlotAssembler::new(&params, FrameTime::new(100, 6), 4, Arc::clone(&queue));
        (rx, assembler, queue)
    }

    #[test]
    fn slot_lengths_cover_a_block() {
        let (_rx, mut assembler, _queue) = setup(1);
        let mut lens = Vec::new();
        for _ in 0..4 {
            lens.push(assembler.slot_len());
            assembler.slot_count += 1;
        }
        assert_eq!(lens, vec![156, 156, 156, 157]);

        let (_rx, assembler, _queue) = setup(4);
        assert_eq!(assembler.slot_len(), 625);
    }

    #[test]
    fn queues_slots_in_time_order() {
        let (mut rx, mut assembler, queue) = setup(4);
        // 6 chunks of 260 samples hold two 625 sample slots
        while rx.pull_buffer().unwrap() == crate::rx_dsp::PullStatus::Received {}
        assert_eq!(assembler.process(&mut rx), 2);
        assert_eq!(rx.cursor(), 1560 - 2 * 625);
        assert_eq!(assembler.time(), FrameTime::new(101, 0));

        assert_eq!(queue.len(), 2);
        let first = queue.get_current_burst(FrameTime::new(100, 6)).unwrap();
        assert_eq!(first.samples().len(), 625);
        assert!(queue.get_stale_burst(FrameTime::new(100, 7)).is_none());
        assert!(queue.get_current_burst(FrameTime::new(100, 7)).is_some());
        assert!(queue.is_empty());

        assert!(assembler.noise_level(0).unwrap() > 0.0);
        assert!(assembler.noise_level(2).is_none());
    }

    #[test]
    fn strongest_channel_is_selected() {
        let (mut rx, mut assembler, queue) = setup(4);
        rx.device_mut().set_amplitude(0, 100.0);
        rx.device_mut().set_amplitude(1, 2000.0);
        while rx.pull_buffer().unwrap() == crate::rx_dsp::PullStatus::Received {}
        assembler.process(&mut rx);

        let burst = queue.get_stale_burst(FrameTime::new(200, 0)).unwrap();
        let energy = burst.samples().energy();
        // Channel 1 carries 20 times the amplitude
        assert!(energy > 1.0e6, "energy {}", energy);
    }

    #[test]
    fn partial_slot_waits_for_more_samples() {
        let (mut rx, mut assembler, queue) = setup(4);
        rx.pull_buffer().unwrap();
        rx.pull_buffer().unwrap();
        assert_eq!(assembler.process(&mut rx), 0);
        assert_eq!(rx.cursor(), 520);
        assert!(queue.is_empty());
    }
}
