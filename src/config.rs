use std::fmt;
use std::str::FromStr;

use crate::bus::SDA_MASK;
use crate::sim_if::time_scale;
use crate::TbError;

/// Status-register address transmitted by a scenario, MSB first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressPattern {
    /// `0111_0010`
    Structured,
    /// `0101_0101`
    Alternating,
    Custom(u8),
}

impl AddressPattern {
    pub fn byte(self) -> u8 {
        match self {
            AddressPattern::Structured => 0x72,
            AddressPattern::Alternating => 0x55,
            AddressPattern::Custom(byte) => byte,
        }
    }

    pub fn bits(self) -> [bool; 8] {
        let byte = self.byte();
        std::array::from_fn(|i| byte & (0x80 >> i) != 0)
    }
}

impl fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b}", self.byte())
    }
}

impl FromStr for AddressPattern {
    type Err = TbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.trim().replace('_', "");
        let lower = stripped.to_ascii_lowercase();
        let parsed = match lower.as_str() {
            "structured" => return Ok(AddressPattern::Structured),
            "alternating" => return Ok(AddressPattern::Alternating),
            hex if hex.starts_with("0x") => u8::from_str_radix(&hex[2..], 16),
            bin if bin.starts_with("0b") => u8::from_str_radix(&bin[2..], 2),
            dec => dec.parse::<u8>(),
        };
        parsed
            .map(AddressPattern::Custom)
            .map_err(|_| TbError::Pattern(s.to_string()))
    }
}

/// Parameters of the reference scenarios.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub clock_period: u32,
    pub clock_unit: &'static str,
    pub cold_reset_cycles: u32,
    pub warm_reset_cycles: u32,
    pub address: AddressPattern,
    /// Bus response expected while no transaction is in flight.
    pub expected_idle: u8,
    /// Bus response expected once the status is latched.
    pub expected_status: u8,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            clock_period: 10,
            clock_unit: "us",
            cold_reset_cycles: 3,
            warm_reset_cycles: 1,
            address: AddressPattern::Alternating,
            expected_idle: 0,
            expected_status: SDA_MASK,
        }
    }
}

impl ScenarioConfig {
    pub fn with_clock(mut self, period: u32, unit: &'static str) -> Self {
        self.clock_period = period;
        self.clock_unit = unit;
        self
    }

    pub fn with_address(mut self, address: AddressPattern) -> Self {
        self.address = address;
        self
    }

    pub fn with_reset_cycles(mut self, cold: u32, warm: u32) -> Self {
        self.cold_reset_cycles = cold;
        self.warm_reset_cycles = warm;
        self
    }

    pub fn with_expected_status(mut self, status: u8) -> Self {
        self.expected_status = status;
        self
    }

    pub fn validate(&self) -> Result<(), TbError> {
        time_scale(self.clock_unit)?;
        if self.clock_period < 2 {
            return Err(TbError::Config(format!(
                "clock period {}{} is shorter than two time units",
                self.clock_period, self.clock_unit
            )));
        }
        if self.cold_reset_cycles == 0 || self.warm_reset_cycles == 0 {
            return Err(TbError::Config(
                "reset must be held for at least one cycle".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_patterns_transmit_msb_first() {
        let bits = |p: AddressPattern| p.bits().map(u8::from);
        assert_eq!(bits(AddressPattern::Structured), [0, 1, 1, 1, 0, 0, 1, 0]);
        assert_eq!(bits(AddressPattern::Alternating), [0, 1, 0, 1, 0, 1, 0, 1]);
        assert_eq!(bits(AddressPattern::Custom(0x80)), [1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn parses_pattern_names_and_literals() {
        assert_eq!("structured".parse::<AddressPattern>(), Ok(AddressPattern::Structured));
        assert_eq!("Alternating".parse::<AddressPattern>(), Ok(AddressPattern::Alternating));
        assert_eq!("0x72".parse::<AddressPattern>(), Ok(AddressPattern::Custom(0x72)));
        assert_eq!("0b0101_0101".parse::<AddressPattern>(), Ok(AddressPattern::Custom(0x55)));
        assert_eq!("18".parse::<AddressPattern>(), Ok(AddressPattern::Custom(18)));
        assert!(matches!(
            "0x1ff".parse::<AddressPattern>(),
            Err(TbError::Pattern(_))
        ));
    }

    #[test]
    fn defaults_match_reference_scenario() {
        let cfg = ScenarioConfig::default();
        assert_eq!((cfg.clock_period, cfg.clock_unit), (10, "us"));
        assert_eq!(cfg.cold_reset_cycles, 3);
        assert_eq!(cfg.warm_reset_cycles, 1);
        assert_eq!(cfg.expected_status, 0b0000_1000);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn rejects_unusable_settings() {
        let cfg = ScenarioConfig::default();
        assert!(cfg.clone().with_clock(1, "us").validate().is_err());
        assert!(cfg.clone().with_clock(10, "lightyears").validate().is_err());
        assert!(cfg.with_reset_cycles(0, 1).validate().is_err());
    }
}
