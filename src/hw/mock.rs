//! In-memory PWM channel for tests. Records every operation and enforces the same register rules
//! as the kernel (duty cycle never above period).

use super::{Hardware, Polarity, PwmChannelState};
use crate::error::HardwareError;
use crate::halt;
use crate::sensor::Temperature;

use std::collections::VecDeque;

/// Operation attempted on the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Export,
    Unexport,
    Enable(bool),
    Period(u64),
    DutyCycle(u64),
    Polarity(Polarity),
}

pub struct MockPwm {
    pub exported: bool,
    pub state: PwmChannelState,
    /// Every attempted write, failed ones included
    pub ops: Vec<Op>,
    pub temperatures: VecDeque<Option<Temperature>>,
    pub export_error: Option<HardwareError>,
    /// Periods above this are refused
    pub max_period: Option<u64>,
    /// Refuse duty cycle equal to the period
    pub reject_full_duty_cycle: bool,
    /// Duty cycles above this fail
    pub fail_duty_cycle_above: Option<u64>,
    /// All duty cycle writes fail
    pub fail_duty_cycle: bool,
    /// Requested once the temperature script runs out
    pub halt_when_exhausted: Option<halt::Sender>,
}

impl MockPwm {
    pub fn new() -> Self {
        Self {
            exported: false,
            state: PwmChannelState {
                period: 0,
                duty_cycle: 0,
                enabled: false,
                polarity: Polarity::Normal,
            },
            ops: Vec::new(),
            temperatures: VecDeque::new(),
            export_error: None,
            max_period: None,
            reject_full_duty_cycle: false,
            fail_duty_cycle_above: None,
            fail_duty_cycle: false,
            halt_when_exhausted: None,
        }
    }

    pub fn with_temperatures(mut self, temperatures: &[Option<Temperature>]) -> Self {
        self.temperatures = temperatures.iter().copied().collect();
        self
    }

    pub fn with_halt(mut self, sender: halt::Sender) -> Self {
        self.halt_when_exhausted = Some(sender);
        self
    }

    /// Attempted duty cycle writes in order
    pub fn duty_cycles(&self) -> Vec<u64> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::DutyCycle(ns) => Some(*ns),
                _ => None,
            })
            .collect()
    }
}

impl Hardware for MockPwm {
    fn is_exported(&self) -> bool {
        self.exported
    }

    fn export(&mut self) -> Result<(), HardwareError> {
        self.ops.push(Op::Export);
        if let Some(error) = self.export_error.clone() {
            return Err(error);
        }
        self.exported = true;
        Ok(())
    }

    fn unexport(&mut self) -> Result<(), HardwareError> {
        self.ops.push(Op::Unexport);
        if !self.exported {
            return Err(HardwareError::InvalidValue);
        }
        self.exported = false;
        Ok(())
    }

    fn set_enable(&mut self, enable: bool) -> Result<(), HardwareError> {
        self.ops.push(Op::Enable(enable));
        self.state.enabled = enable;
        Ok(())
    }

    fn set_period(&mut self, ns: u64) -> Result<(), HardwareError> {
        self.ops.push(Op::Period(ns));
        if self.max_period.map_or(false, |max| ns > max) || ns < self.state.duty_cycle {
            return Err(HardwareError::InvalidValue);
        }
        self.state.period = ns;
        Ok(())
    }

    fn set_duty_cycle(&mut self, ns: u64) -> Result<(), HardwareError> {
        self.ops.push(Op::DutyCycle(ns));
        if self.fail_duty_cycle || self.fail_duty_cycle_above.map_or(false, |max| ns > max) {
            return Err(HardwareError::Unknown("injected failure".to_string()));
        }
        if ns > self.state.period || (self.reject_full_duty_cycle && ns == self.state.period) {
            return Err(HardwareError::InvalidValue);
        }
        self.state.duty_cycle = ns;
        Ok(())
    }

    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), HardwareError> {
        self.ops.push(Op::Polarity(polarity));
        if self.state.enabled {
            return Err(HardwareError::ResourceBusy);
        }
        self.state.polarity = polarity;
        Ok(())
    }

    fn read_state(&self) -> Result<PwmChannelState, HardwareError> {
        if !self.exported {
            return Err(HardwareError::Unknown("not exported".to_string()));
        }
        Ok(self.state)
    }

    fn read_max_supported_duty_cycle(&self) -> Result<u64, HardwareError> {
        Ok(self.state.period)
    }

    fn read_temperature(&mut self) -> Option<Temperature> {
        match self.temperatures.pop_front() {
            Some(temperature) => temperature,
            None => {
                if let Some(sender) = &self.halt_when_exhausted {
                    sender.send_halt();
                }
                None
            }
        }
    }
}

/// Lets a test lend the mock to code that takes ownership of its hardware
impl Hardware for &mut MockPwm {
    fn is_exported(&self) -> bool {
        (**self).is_exported()
    }

    fn export(&mut self) -> Result<(), HardwareError> {
        (**self).export()
    }

    fn unexport(&mut self) -> Result<(), HardwareError> {
        (**self).unexport()
    }

    fn set_enable(&mut self, enable: bool) -> Result<(), HardwareError> {
        (**self).set_enable(enable)
    }

    fn set_period(&mut self, ns: u64) -> Result<(), HardwareError> {
        (**self).set_period(ns)
    }

    fn set_duty_cycle(&mut self, ns: u64) -> Result<(), HardwareError> {
        (**self).set_duty_cycle(ns)
    }

    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), HardwareError> {
        (**self).set_polarity(polarity)
    }

    fn read_state(&self) -> Result<PwmChannelState, HardwareError> {
        (**self).read_state()
    }

    fn read_max_supported_duty_cycle(&self) -> Result<u64, HardwareError> {
        (**self).read_max_supported_duty_cycle()
    }

    fn read_temperature(&mut self) -> Option<Temperature> {
        (**self).read_temperature()
    }
}
