/// Input pins as sampled at a rising clock edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceInputs {
    pub rst_n: bool,
    pub ena: bool,
    pub ui_in: u8,
    pub uio_in: u8,
}

/// Output pins, valid from the clock edge that produced them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceOutputs {
    pub uo_out: u8,
    pub uio_out: u8,
    pub uio_oe: u8,
}

/// Synchronous behavioural model of a device under test.
pub trait Device {
    fn rising_edge(&mut self, inputs: DeviceInputs) -> DeviceOutputs;
}
