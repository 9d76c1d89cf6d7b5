//! Bus stimulus as data: every phase is a list of (line levels, cycles to hold) steps.

use crate::bus::BusLines;

/// Cycles each level of the START stimulus is held, one bus clock period.
pub const START_HOLD_CYCLES: u32 = 8;

/// Drive `lines`, then wait `cycles` rising edges of the system clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub lines: BusLines,
    pub cycles: u32,
}

impl Step {
    pub const fn new(scl: bool, sda: bool, cycles: u32) -> Self {
        Step {
            lines: BusLines::new(scl, sda),
            cycles,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Clock line toggled once, then both lines released.
    Idle,
    /// START signature: data falls while the clock line is held high.
    Start,
    /// One address bit: data set up, clock pulsed, both lines released.
    Bit(bool),
    /// Clock pulse after the last address bit that makes the device latch its status.
    Pulse,
}

const IDLE: [Step; 2] = [Step::new(true, false, 1), Step::new(false, false, 1)];

// The third level keeps data released high while the clock drops, as the
// reference stimulus does.
const START: [Step; 4] = [
    Step::new(true, true, START_HOLD_CYCLES),
    Step::new(true, false, START_HOLD_CYCLES),
    Step::new(false, true, START_HOLD_CYCLES),
    Step::new(false, false, START_HOLD_CYCLES),
];

// The status is sampled right after the clock drops, so the last step holds nothing.
const PULSE: [Step; 2] = [Step::new(true, false, 1), Step::new(false, false, 0)];

impl Phase {
    pub fn steps(&self) -> Vec<Step> {
        match *self {
            Phase::Idle => IDLE.to_vec(),
            Phase::Start => START.to_vec(),
            Phase::Bit(bit) => vec![
                Step::new(false, bit, 1),
                Step::new(true, bit, 1),
                Step::new(false, false, 1),
            ],
            Phase::Pulse => PULSE.to_vec(),
        }
    }

    /// Rising clock edges the phase spans.
    pub fn cycles(&self) -> u32 {
        self.steps().iter().map(|s| s.cycles).sum()
    }
}

/// One `Phase::Bit` per bit, in transmission order.
pub fn bit_phases(bits: &[bool]) -> impl Iterator<Item = Phase> + '_ {
    bits.iter().map(|&b| Phase::Bit(b))
}
