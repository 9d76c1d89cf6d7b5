use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TbError {
    /// Sampled output differs from the expected value at a checkpoint.
    #[error("checkpoint '{checkpoint}' mismatch: expected {expected:#010b}, sampled {actual:#010b}")]
    Mismatch {
        checkpoint: String,
        expected: u32,
        actual: u32,
    },
    #[error("no simulation object named '{0}'")]
    NoSuchObject(String),
    #[error("object '{0}' does not carry a value")]
    NotAValue(String),
    #[error("value {value:#x} does not fit {width}-bit object '{name}'")]
    Width { name: String, value: u32, width: u32 },
    #[error("unknown time unit '{0}'")]
    TimeUnit(String),
    #[error("can't convert {0} to simulation steps without rounding")]
    TimeConversion(String),
    #[error("callback handle {0} is not registered")]
    Callback(usize),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid address pattern '{0}'")]
    Pattern(String),
    #[error("task cancelled before completion")]
    Cancelled,
    #[error("test did not complete before the end of simulation")]
    Incomplete,
    #[error("failed to write report: {0}")]
    Report(String),
}
