//! Air interface frame timing.

use std::fmt;

/// Frames per hyperframe, after which frame numbers wrap.
pub const HYPERFRAME: u32 = 2048 * 26 * 51;
/// Timeslots per TDMA frame.
pub const TIMESLOTS: u8 = 8;

/// Frame number and timeslot of a burst.
///
/// Ordered by frame, then timeslot. Ordering does not account for
/// hyperframe wraparound.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameTime {
    frame: u32,
    timeslot: u8,
}

impl FrameTime {
    pub fn new(frame: u32, timeslot: u8) -> Self {
        Self {
            frame: frame % HYPERFRAME,
            timeslot: timeslot % TIMESLOTS,
        }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn timeslot(&self) -> u8 {
        self.timeslot
    }

    /// Time of the following timeslot.
    pub fn next_slot(self) -> Self {
        if self.timeslot + 1 < TIMESLOTS {
            Self { frame: self.frame, timeslot: self.timeslot + 1 }
        } else {
            Self { frame: (self.frame + 1) % HYPERFRAME, timeslot: 0 }
        }
    }
}

impl fmt::Display for FrameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.frame, self.timeslot)
    }
}
