//! This module is responsible for bringing the fan PWM channel up, driving its duty cycle and
//! releasing it again.

pub mod logistic;
pub mod pid;
pub mod window;

use crate::config::{Config, ControllerKind};
use crate::error::{self, ErrorKind, HardwareError};
use crate::halt;
use crate::hw::{Hardware, Polarity};
use crate::sensor::Temperature;
use window::ThermalWindow;

use failure::ResultExt;
use log::{debug, info, warn};

use std::time::Duration;

/// Every retry of the period lowers it by this much
const PERIOD_STEP_NS: u64 = 1_000_000;
/// Smallest period tried before giving up
const PERIOD_FLOOR_NS: u64 = 1_000_000;
/// Most periods tried before giving up
const MAX_PERIOD_ATTEMPTS: usize = 100;
/// Some controllers refuse a duty cycle equal to the period
const MAX_DUTY_CYCLE_FALLBACK_NS: u64 = 100;
/// Pause at half speed between warmup and regulation
const SETTLE_TIME: Duration = Duration::from_secs(1);

/// Duty cycle limits used while the fan is regulated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycleBounds {
    min: u64,
    max: u64,
}

impl DutyCycleBounds {
    pub fn new(min: u64, max: u64) -> error::Result<Self> {
        if min >= max {
            return Err(ErrorKind::Startup(format!(
                "empty duty cycle range {}..{} ns",
                min, max
            ))
            .into());
        }
        Ok(Self { min, max })
    }

    /// Derive bounds as percentages of the largest duty cycle the channel accepts
    pub fn from_percent(
        max_duty_cycle: u64,
        min_percent: u8,
        max_percent: u8,
    ) -> error::Result<Self> {
        let percent_of = |percent: u8| {
            max_duty_cycle
                .checked_mul(percent as u64)
                .map(|value| value / 100)
                .ok_or_else(|| {
                    ErrorKind::Startup(format!(
                        "duty cycle {} ns is too large to scale",
                        max_duty_cycle
                    ))
                })
        };
        Self::new(percent_of(min_percent)?, percent_of(max_percent)?)
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Truncate `value` to whole nanoseconds and clamp it into the bounds.
    /// The flag tells whether clamping took place. NaN maps to the minimum.
    pub fn clamp(&self, value: f64) -> (u64, bool) {
        let value = value.trunc();
        if value.is_nan() || value < self.min as f64 {
            (self.min, true)
        } else if value > self.max as f64 {
            (self.max, true)
        } else {
            (value as u64, false)
        }
    }
}

/// Algorithm proposing a duty cycle while the temperature is inside the controlled band
pub trait DutyCycleController {
    fn name(&self) -> &'static str;

    /// Return duty cycle (already clamped to `bounds`) for the latest sample in `window`
    fn compute(
        &mut self,
        window: &ThermalWindow,
        bounds: DutyCycleBounds,
        current_duty_cycle: u64,
    ) -> u64;
}

/// Build the controller selected by the configuration. Without a configured ideal temperature
/// the PID controller aims slightly above the temperature reached during warmup.
pub fn controller(
    config: &Config,
    warmup_temperature: Option<Temperature>,
) -> Box<dyn DutyCycleController> {
    match config.controller_kind {
        ControllerKind::Logistic => Box::new(logistic::LogisticControl::new()),
        ControllerKind::Pid => {
            let ideal = match (config.pid_ideal_temp, warmup_temperature) {
                (Some(ideal), _) => ideal,
                (None, Some(temperature)) => pid::PidControl::ideal_from_warmup(temperature),
                (None, None) => {
                    let ideal = (config.temp_low + config.temp_high) / 2;
                    warn!(
                        "No temperature after warmup, PID aims at the middle of the band ({} °C)",
                        ideal
                    );
                    ideal
                }
            };
            info!(
                "PID ideal temperature {} °C (kp={}, ki={}, kd={})",
                ideal, config.pid_kp, config.pid_ki, config.pid_kd
            );
            Box::new(pid::PidControl::new(
                config.pid_kp,
                config.pid_ki,
                config.pid_kd,
                ideal,
                config.loop_interval(),
            ))
        }
    }
}

/// Parameters of the startup sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub period_ns: u64,
    pub duty_min_percent: u8,
    pub duty_max_percent: u8,
    /// How long the fan runs at full speed after start
    pub warmup: Duration,
    /// How long the fan stays at half speed before regulation starts
    pub settle: Duration,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            period_ns: config.period_ns,
            duty_min_percent: config.duty_min_percent,
            duty_max_percent: config.duty_max_percent,
            warmup: config.startup(),
            settle: SETTLE_TIME,
        }
    }
}

/// Outcome of the startup sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Startup {
    pub bounds: DutyCycleBounds,
    /// Temperature at the end of the full speed warmup (if it completed)
    pub warmup_temperature: Option<Temperature>,
}

/// Owner of the fan PWM channel. Dropping it stops the fan and releases the channel.
pub struct Control<H: Hardware> {
    hw: H,
    settings: Settings,
    /// Last duty cycle successfully written
    duty_cycle: u64,
    max_duty_cycle: u64,
    shut_down: bool,
}

impl<H: Hardware> Control<H> {
    pub fn new(hw: H, settings: Settings) -> Self {
        Self {
            hw,
            settings,
            duty_cycle: 0,
            max_duty_cycle: 0,
            shut_down: false,
        }
    }

    /// Run the one-time startup sequence. Any error is fatal; the caller is expected to shut the
    /// fan down and exit.
    pub fn start(&mut self, halt: &halt::Receiver) -> error::Result<Startup> {
        self.export()?;
        self.apply_defaults()?;
        let max_duty_cycle = self.probe_max_duty_cycle()?;
        let bounds = DutyCycleBounds::from_percent(
            max_duty_cycle,
            self.settings.duty_min_percent,
            self.settings.duty_max_percent,
        )?;
        info!(
            "Duty cycle range {}..{} ns (maximum {} ns)",
            bounds.min(),
            bounds.max(),
            max_duty_cycle
        );

        self.hw
            .set_enable(true)
            .context(ErrorKind::Startup("cannot enable PWM channel".to_string()))?;

        info!(
            "Warming up at full speed for {} s",
            self.settings.warmup.as_secs()
        );
        let mut startup = Startup {
            bounds,
            warmup_temperature: None,
        };
        if !halt.sleep(self.settings.warmup) {
            info!("Startup interrupted during warmup");
            return Ok(startup);
        }
        startup.warmup_temperature = self.hw.read_temperature();

        let half = max_duty_cycle / 2;
        self.hw
            .set_duty_cycle(half)
            .context(ErrorKind::Startup("cannot drop to half speed".to_string()))?;
        self.duty_cycle = half;
        halt.sleep(self.settings.settle);

        Ok(startup)
    }

    fn export(&mut self) -> error::Result<()> {
        if self.hw.is_exported() {
            debug!("PWM channel already exported");
            return Ok(());
        }
        match self.hw.export() {
            Ok(()) => info!("PWM channel exported"),
            Err(HardwareError::ResourceBusy) => info!("PWM channel already exported"),
            Err(e) => {
                return Err(e)
                    .context(ErrorKind::Startup("cannot export PWM channel".to_string()))
                    .map_err(Into::into)
            }
        }
        Ok(())
    }

    /// Put the channel into a known state: disabled, zero duty cycle, configured period and
    /// normal polarity
    fn apply_defaults(&mut self) -> error::Result<()> {
        match self.hw.read_state() {
            Ok(state) if state.enabled => {
                info!(
                    "PWM channel already enabled at {} / {} ns, resetting",
                    state.duty_cycle, state.period
                );
                if let Err(e) = self.hw.set_enable(false) {
                    warn!("Cannot disable PWM channel: {}", e);
                }
            }
            Ok(state) => debug!("PWM channel state {:?}", state),
            Err(e) => debug!("Cannot read PWM channel state: {}", e),
        }

        match self.hw.set_duty_cycle(0) {
            Ok(()) => self.duty_cycle = 0,
            Err(e) => warn!("Cannot reset duty cycle: {}", e),
        }
        self.apply_period()?;
        if let Err(e) = self.hw.set_polarity(Polarity::Normal) {
            warn!("Cannot set normal polarity: {}", e);
        }
        Ok(())
    }

    /// Write the configured period, lowering it step by step when the channel refuses it
    fn apply_period(&mut self) -> error::Result<u64> {
        let configured = self.settings.period_ns;
        let mut period = configured;
        for _ in 0..MAX_PERIOD_ATTEMPTS {
            match self.hw.set_period(period) {
                Ok(()) => {
                    if period != configured {
                        warn!(
                            "PWM period {} ns rejected, using {} ns",
                            configured, period
                        );
                    }
                    return Ok(period);
                }
                Err(e) => debug!("PWM period {} ns rejected: {}", period, e),
            }
            if period < PERIOD_FLOOR_NS + PERIOD_STEP_NS {
                break;
            }
            period -= PERIOD_STEP_NS;
        }
        Err(ErrorKind::Startup(format!(
            "no acceptable PWM period at or below {} ns",
            configured
        ))
        .into())
    }

    /// Find the largest duty cycle the channel accepts and leave the channel at it
    fn probe_max_duty_cycle(&mut self) -> error::Result<u64> {
        let period = self
            .hw
            .read_max_supported_duty_cycle()
            .context(ErrorKind::Startup("cannot read PWM period".to_string()))?;

        let candidates = [period, period.saturating_sub(MAX_DUTY_CYCLE_FALLBACK_NS)];
        for candidate in candidates {
            if candidate == 0 {
                continue;
            }
            match self.hw.set_duty_cycle(candidate) {
                Ok(()) => {
                    self.duty_cycle = candidate;
                    self.max_duty_cycle = candidate;
                    return Ok(candidate);
                }
                Err(e) => debug!("Duty cycle {} ns rejected: {}", candidate, e),
            }
        }
        Err(ErrorKind::Startup(format!(
            "PWM channel accepts neither {} nor {} ns duty cycle",
            candidates[0], candidates[1]
        ))
        .into())
    }

    /// Write a new duty cycle; the cached value only changes on success
    pub fn set_duty_cycle(&mut self, ns: u64) -> Result<(), HardwareError> {
        self.hw.set_duty_cycle(ns)?;
        self.duty_cycle = ns;
        Ok(())
    }

    /// Last duty cycle successfully written
    pub fn duty_cycle(&self) -> u64 {
        self.duty_cycle
    }

    /// Largest duty cycle found during startup (0 before startup)
    pub fn max_duty_cycle(&self) -> u64 {
        self.max_duty_cycle
    }

    pub fn read_temperature(&mut self) -> Option<Temperature> {
        self.hw.read_temperature()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Stop the fan and release the channel. Runs at most once; every step is attempted even if
    /// the previous one failed.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            debug!("Fan already shut down");
            return;
        }
        self.shut_down = true;

        info!("Stopping fan");
        match self.hw.set_duty_cycle(0) {
            Ok(()) => self.duty_cycle = 0,
            Err(e) => warn!("Cannot set duty cycle to zero: {}", e),
        }
        if let Err(e) = self.hw.set_enable(false) {
            warn!("Cannot disable PWM channel: {}", e);
        }
        match self.hw.unexport() {
            Ok(()) => info!("PWM channel released"),
            Err(e) => warn!("Cannot release PWM channel: {}", e),
        }
    }

    #[cfg(test)]
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    #[cfg(test)]
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }
}

impl<H: Hardware> Drop for Control<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
