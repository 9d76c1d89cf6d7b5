//! Pin-level view of the device under test.
//!
//! The bidirectional vector carries the two bus lines: bit 2 is the bus clock (SCL),
//! bit 3 the bus data line (SDA). The harness never drives any other bit of it.

use crate::prelude::*;

pub const CLK: &str = "clk";
pub const RST_N: &str = "rst_n";
pub const ENA: &str = "ena";
pub const UI_IN: &str = "ui_in";
pub const UIO_IN: &str = "uio_in";
pub const UIO_OUT: &str = "uio_out";
pub const UIO_OE: &str = "uio_oe";
pub const UO_OUT: &str = "uo_out";

pub const SCL_BIT: u8 = 2;
pub const SDA_BIT: u8 = 3;
pub const SCL_MASK: u8 = 1 << SCL_BIT;
pub const SDA_MASK: u8 = 1 << SDA_BIT;

/// Levels of the two bus lines as driven by the harness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BusLines {
    pub scl: bool,
    pub sda: bool,
}

impl BusLines {
    pub const RELEASED: BusLines = BusLines::new(false, false);

    pub const fn new(scl: bool, sda: bool) -> Self {
        BusLines { scl, sda }
    }

    /// Position of the lines on the bidirectional vector.
    pub fn encode(self) -> u8 {
        (u8::from(self.scl) << SCL_BIT) | (u8::from(self.sda) << SDA_BIT)
    }

    pub fn decode(uio: u8) -> Self {
        BusLines {
            scl: uio & SCL_MASK != 0,
            sda: uio & SDA_MASK != 0,
        }
    }
}

/// The pins the harness drives and samples.
///
/// Writes need `&mut self`: the sequencer and the stimulus engine each borrow the bus
/// exclusively for their part of a scenario, so there is exactly one writer at a time.
#[derive(Debug)]
pub struct PinBus {
    clk: SimObject,
    rst_n: SimObject,
    ena: SimObject,
    ui_in: SimObject,
    uio_in: SimObject,
    uio_out: SimObject,
    driven: BusLines,
}

impl PinBus {
    pub fn from_dut(dut: SimObject) -> SimpleResult<Self> {
        Ok(PinBus {
            clk: dut.c(CLK)?,
            rst_n: dut.c(RST_N)?,
            ena: dut.c(ENA)?,
            ui_in: dut.c(UI_IN)?,
            uio_in: dut.c(UIO_IN)?,
            uio_out: dut.c(UIO_OUT)?,
            driven: BusLines::RELEASED,
        })
    }

    pub fn clock(&self) -> SimObject {
        self.clk
    }

    pub fn set_enable(&mut self, enabled: bool) -> SimpleResult<()> {
        self.ena.set(u32::from(enabled))
    }

    /// Drives the active-low reset pin.
    pub fn set_reset(&mut self, asserted: bool) -> SimpleResult<()> {
        self.rst_n.set(u32::from(!asserted))
    }

    /// Zeroes the input vector and releases both bus lines.
    pub fn clear_inputs(&mut self) -> SimpleResult<()> {
        self.ui_in.set(0)?;
        self.drive(BusLines::RELEASED)
    }

    pub fn drive(&mut self, lines: BusLines) -> SimpleResult<()> {
        self.uio_in.set(u32::from(lines.encode()))?;
        self.driven = lines;
        Ok(())
    }

    /// Lines as last driven by the harness.
    pub fn driven(&self) -> BusLines {
        self.driven
    }

    /// Current value of the device-driven bidirectional vector.
    pub fn sample(&self) -> SimpleResult<u8> {
        Ok((self.uio_out.u32()? & 0xff) as u8)
    }
}
