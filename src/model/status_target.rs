use super::device::{Device, DeviceInputs, DeviceOutputs};
use crate::bus::{BusLines, SDA_MASK};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    Idle,
    StartDetected,
    AddressMatched,
    StatusLatched,
}

/// Two-wire status target that oversamples SCL/SDA with the system clock.
///
/// Bits are shifted in MSB first on every SCL rising edge. Once the last eight bits
/// equal `address`, the next SCL rising edge latches the status: the MSB of the status
/// byte is driven on SDA. A START condition clears the shift register.
#[derive(Clone, Debug)]
pub struct StatusTarget {
    address: u8,
    status: u8,
    state: TargetState,
    shift: u8,
    seen: u8,
    prev: BusLines,
    outputs: DeviceOutputs,
}

impl StatusTarget {
    pub fn new(address: u8) -> Self {
        StatusTarget {
            address,
            status: 0x80,
            state: TargetState::Idle,
            shift: 0,
            seen: 0,
            prev: BusLines::RELEASED,
            outputs: DeviceOutputs::default(),
        }
    }

    pub fn with_status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    fn reset(&mut self) {
        *self = StatusTarget::new(self.address).with_status(self.status);
    }

    fn on_scl_rise(&mut self, sda: bool) {
        match self.state {
            TargetState::AddressMatched => {
                self.state = TargetState::StatusLatched;
                let sda_out = if self.status & 0x80 != 0 { SDA_MASK } else { 0 };
                self.outputs.uio_out = sda_out;
                self.outputs.uio_oe = SDA_MASK;
            }
            TargetState::StatusLatched => {}
            TargetState::Idle | TargetState::StartDetected => {
                self.shift = (self.shift << 1) | u8::from(sda);
                self.seen = self.seen.saturating_add(1);
                if self.seen >= 8 && self.shift == self.address {
                    self.state = TargetState::AddressMatched;
                }
            }
        }
    }
}

impl Device for StatusTarget {
    fn rising_edge(&mut self, inputs: DeviceInputs) -> DeviceOutputs {
        if !inputs.rst_n {
            self.reset();
            return self.outputs;
        }
        if !inputs.ena {
            return self.outputs;
        }
        let now = BusLines::decode(inputs.uio_in);
        let prev = std::mem::replace(&mut self.prev, now);
        if prev.scl && now.scl && prev.sda && !now.sda {
            self.state = TargetState::StartDetected;
            self.shift = 0;
            self.seen = 0;
            self.outputs = DeviceOutputs::default();
        } else if !prev.scl && now.scl {
            self.on_scl_rise(now.sda);
        }
        self.outputs
    }
}
