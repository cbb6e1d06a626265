//! Abstraction of the PWM channel driving the fan and of the chip temperature sensor.

pub mod sysfs;

#[cfg(test)]
pub mod mock;

use crate::error::HardwareError;
use crate::sensor::Temperature;

use std::fmt;
use std::str::FromStr;

/// Output polarity of the PWM signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Normal,
    Inverted,
}

impl Polarity {
    /// Spelling used by the kernel PWM class
    pub fn as_sysfs(&self) -> &'static str {
        match self {
            Polarity::Normal => "normal",
            Polarity::Inverted => "inversed",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_sysfs())
    }
}

impl FromStr for Polarity {
    type Err = HardwareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "normal" => Ok(Polarity::Normal),
            "inversed" | "inverted" => Ok(Polarity::Inverted),
            _ => Err(HardwareError::InvalidValue),
        }
    }
}

/// Snapshot of the channel registers as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmChannelState {
    /// Length of one PWM cycle in nanoseconds
    pub period: u64,
    /// "On" time within one period in nanoseconds
    pub duty_cycle: u64,
    pub enabled: bool,
    pub polarity: Polarity,
}

/// Everything the fan controller needs from the platform. The channel (chip and channel number)
/// is bound when the implementation is constructed.
pub trait Hardware {
    /// `true` if the channel is already visible to user space
    fn is_exported(&self) -> bool;

    fn export(&mut self) -> Result<(), HardwareError>;

    fn unexport(&mut self) -> Result<(), HardwareError>;

    fn set_enable(&mut self, enable: bool) -> Result<(), HardwareError>;

    fn set_period(&mut self, ns: u64) -> Result<(), HardwareError>;

    fn set_duty_cycle(&mut self, ns: u64) -> Result<(), HardwareError>;

    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), HardwareError>;

    fn read_state(&self) -> Result<PwmChannelState, HardwareError>;

    /// Largest duty cycle the channel can currently represent (its period)
    fn read_max_supported_duty_cycle(&self) -> Result<u64, HardwareError>;

    /// Chip temperature in degrees Celsius, `None` if no sensor reading is available
    fn read_temperature(&mut self) -> Option<Temperature>;
}
