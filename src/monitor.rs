//! Temperature monitor driving the fan.
//!
//! Every tick the chip temperature is sampled into a [`ThermalWindow`] and the latest sample picks
//! the [`Mode`]: fan off, pinned to one of the duty cycle bounds, regulated by the configured
//! controller, or left alone. With monitoring disabled the fan is kept at full speed.

use crate::config::{Config, Thresholds};
use crate::fan::{self, window::ThermalWindow, DutyCycleBounds, DutyCycleController};
use crate::halt;
use crate::hw::Hardware;
use crate::sensor::Temperature;

use log::{debug, info, warn};

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Monitoring disabled, maximal duty cycle
    FullSpeed,
    /// At or below the off threshold, zero duty cycle
    Off,
    /// Minimal duty cycle
    SaturatedLow,
    /// Maximal duty cycle
    SaturatedHigh,
    /// Duty cycle computed by the controller
    Controlled,
    /// First sample in the controlled band, controller needs one more
    AwaitingHistory,
    /// Between the off and on thresholds, duty cycle is left alone
    DeadZone,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Mode::FullSpeed => "full speed",
            Mode::Off => "off",
            Mode::SaturatedLow => "saturated low",
            Mode::SaturatedHigh => "saturated high",
            Mode::Controlled => "controlled",
            Mode::AwaitingHistory => "awaiting history",
            Mode::DeadZone => "dead zone",
        };
        f.write_str(name)
    }
}

/// Pick the mode for the `latest` sample given how many `samples` the window holds
pub fn select_mode(latest: Temperature, samples: usize, thresholds: &Thresholds) -> Mode {
    if latest <= thresholds.off {
        Mode::Off
    } else if latest >= thresholds.on {
        if latest <= thresholds.low {
            Mode::SaturatedLow
        } else if latest >= thresholds.high {
            Mode::SaturatedHigh
        } else if samples > 1 {
            Mode::Controlled
        } else {
            Mode::AwaitingHistory
        }
    } else {
        Mode::DeadZone
    }
}

pub struct Monitor {
    window: ThermalWindow,
    controller: Box<dyn DutyCycleController>,
    thresholds: Thresholds,
    bounds: DutyCycleBounds,
    interval: Duration,
    monitoring: bool,
    mode: Option<Mode>,
}

impl Monitor {
    pub fn new(
        config: &Config,
        bounds: DutyCycleBounds,
        controller: Box<dyn DutyCycleController>,
    ) -> Self {
        Self {
            window: ThermalWindow::new(config.window_capacity),
            controller,
            thresholds: config.thresholds(),
            bounds,
            interval: config.loop_interval(),
            monitoring: config.monitoring_enabled(),
            mode: None,
        }
    }

    /// Mode chosen by the last tick that had a sample
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn window(&self) -> &ThermalWindow {
        &self.window
    }

    /// Run one sense-decide-actuate step. Returns `None` when no temperature was available and
    /// nothing was done.
    pub fn tick<H: Hardware>(&mut self, fan: &mut fan::Control<H>) -> Option<Mode> {
        if !self.monitoring {
            self.transition(Mode::FullSpeed, None);
            let max_duty_cycle = fan.max_duty_cycle();
            self.actuate(fan, max_duty_cycle);
            return Some(Mode::FullSpeed);
        }

        let latest = match fan.read_temperature() {
            Some(temperature) => temperature,
            None => {
                debug!("No temperature sample, skipping tick");
                return None;
            }
        };
        self.window.push(latest);

        let mode = select_mode(latest, self.window.len(), &self.thresholds);
        self.transition(mode, Some(latest));
        let duty_cycle = match mode {
            Mode::Off => Some(0),
            Mode::SaturatedLow => Some(self.bounds.min()),
            Mode::SaturatedHigh => Some(self.bounds.max()),
            Mode::Controlled => Some(self.controller.compute(
                &self.window,
                self.bounds,
                fan.duty_cycle(),
            )),
            Mode::FullSpeed => Some(fan.max_duty_cycle()),
            Mode::AwaitingHistory | Mode::DeadZone => None,
        };
        debug!(
            "{} °C (mean {} °C): {}, duty cycle {:?}",
            latest,
            self.window.mean(),
            mode,
            duty_cycle
        );
        if let Some(duty_cycle) = duty_cycle {
            self.actuate(fan, duty_cycle);
        }
        Some(mode)
    }

    /// Tick every interval until halted
    pub fn run<H: Hardware>(&mut self, fan: &mut fan::Control<H>, halt: &halt::Receiver) {
        info!(
            "Monitoring started ({} controller, every {} s)",
            self.controller.name(),
            self.interval.as_secs()
        );
        while !halt.is_halted() {
            self.tick(fan);
            if !halt.sleep(self.interval) {
                break;
            }
        }
        info!("Monitoring stopped");
    }

    fn transition(&mut self, mode: Mode, latest: Option<Temperature>) {
        if self.mode == Some(mode) {
            return;
        }
        match latest {
            Some(latest) => info!("Fan mode {} at {} °C", mode, latest),
            None => info!("Fan mode {}", mode),
        }
        self.mode = Some(mode);
    }

    /// Steady state writes are best effort, the next tick writes again
    fn actuate<H: Hardware>(&self, fan: &mut fan::Control<H>, duty_cycle: u64) {
        if let Err(e) = fan.set_duty_cycle(duty_cycle) {
            warn!("Cannot set duty cycle to {} ns: {}", duty_cycle, e);
        }
    }
}
