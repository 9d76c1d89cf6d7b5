//! Clock generation and reset sequencing.

use crate::bus::PinBus;
use crate::prelude::*;

/// Free-running clock on `clk`. Never returns on its own; it stops when the test tears down.
#[allow(unreachable_code)]
pub async fn clock(clk: SimObject, period: u32, unit: &'static str) -> TbResult {
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        sim_log(&format!(
            "Warning: Clock period {period}{unit} not dividable by 2. High time will be {high}{unit}; low time will be {low}{unit}.",
            period = period, unit = unit, high = high_t, low = low_t
        ));
    }
    let low = sim_if().get_sim_steps(low_t as f64, unit)?;
    let high = sim_if().get_sim_steps(high_t as f64, unit)?;
    loop {
        clk.set(0)?;
        Trigger::timer_steps(low).await?;
        clk.set(1)?;
        Trigger::timer_steps(high).await?;
    }
    Ok(Val::None)
}

/// Forks the clock of `bus` with the given period.
///
/// The period is checked up front so a bad value fails the caller instead of the
/// background task.
pub fn start_clock(bus: &PinBus, period: u32, unit: &'static str) -> SimpleResult<JoinHandle> {
    if period < 2 {
        return Err(TbError::Config(format!(
            "clock period {}{} is shorter than two time units",
            period, unit
        )));
    }
    let sim = sim_if();
    sim.get_sim_steps((period / 2) as f64, unit)?;
    sim.get_sim_steps((period - period / 2) as f64, unit)?;
    Ok(Task::fork(clock(bus.clock(), period, unit)))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResetKind {
    /// Reset held from the start of the scenario.
    Cold,
    /// One live cycle out of reset, then reset asserted.
    Warm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Reset {
    pub kind: ResetKind,
    pub hold_cycles: u32,
}

impl Reset {
    pub fn cold(hold_cycles: u32) -> Self {
        Reset {
            kind: ResetKind::Cold,
            hold_cycles,
        }
    }

    pub fn warm(hold_cycles: u32) -> Self {
        Reset {
            kind: ResetKind::Warm,
            hold_cycles,
        }
    }
}

/// Enables the device, zeroes every input and runs the reset protocol.
pub async fn reset(bus: &mut PinBus, reset: Reset) -> SimpleResult<()> {
    bus.set_enable(true)?;
    bus.clear_inputs()?;
    let clk = bus.clock();
    if reset.kind == ResetKind::Warm {
        bus.set_reset(false)?;
        utils::clock_cycles(clk, 1).await?;
    }
    bus.set_reset(true)?;
    utils::clock_cycles(clk, reset.hold_cycles).await?;
    bus.set_reset(false)
}
