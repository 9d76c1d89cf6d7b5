//! Bus stimulus and output verification.

use crate::bus::PinBus;
use crate::phase::{bit_phases, Phase, Step};
use crate::prelude::*;

/// Expected bus response at a named point of a scenario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pub id: String,
    pub expected: u8,
}

impl Checkpoint {
    pub fn new(id: impl Into<String>, expected: u8) -> Self {
        Checkpoint {
            id: id.into(),
            expected,
        }
    }
}

/// Drives stimulus onto the bus lines of a [`PinBus`] it holds exclusively.
pub struct BusDriver<'a> {
    bus: &'a mut PinBus,
}

impl<'a> BusDriver<'a> {
    pub fn new(bus: &'a mut PinBus) -> Self {
        BusDriver { bus }
    }

    pub async fn apply(&mut self, step: Step) -> SimpleResult<()> {
        self.bus.drive(step.lines)?;
        utils::clock_cycles(self.bus.clock(), step.cycles).await
    }

    pub async fn run_phase(&mut self, phase: Phase) -> SimpleResult<()> {
        for step in phase.steps() {
            self.apply(step).await?;
        }
        Ok(())
    }

    pub async fn drive_bit(&mut self, bit: bool) -> SimpleResult<()> {
        self.run_phase(Phase::Bit(bit)).await
    }

    pub async fn transmit_pattern(&mut self, bits: &[bool]) -> SimpleResult<()> {
        for phase in bit_phases(bits) {
            self.run_phase(phase).await?;
        }
        Ok(())
    }

    pub async fn start_condition(&mut self) -> SimpleResult<()> {
        self.run_phase(Phase::Start).await
    }

    pub async fn idle(&mut self) -> SimpleResult<()> {
        self.run_phase(Phase::Idle).await
    }

    pub async fn trailing_pulse(&mut self) -> SimpleResult<()> {
        self.run_phase(Phase::Pulse).await
    }

    /// Samples the bus response and fails on any differing bit.
    pub fn sample_and_assert(&self, checkpoint: &Checkpoint) -> SimpleResult<u8> {
        let actual = self.bus.sample()?;
        if actual != checkpoint.expected {
            return Err(TbError::Mismatch {
                checkpoint: checkpoint.id.clone(),
                expected: u32::from(checkpoint.expected),
                actual: u32::from(actual),
            });
        }
        sim_log(&format!(
            "Checkpoint '{}' passed: uio_out={:#010b}",
            checkpoint.id, actual
        ));
        Ok(actual)
    }
}
