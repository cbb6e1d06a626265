//! Runtime configuration of the fan daemon.
//!
//! The structure can be read from a TOML file; the command line layer (see `cli`) overrides
//! individual options and checks their user facing ranges. [`Config::validate`] only enforces
//! what the control loop itself relies on.

use crate::error::{self, ErrorKind};
use crate::sensor::Temperature;

use failure::ResultExt;
use serde::Deserialize;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Algorithm computing the duty cycle inside the controlled band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerKind {
    Logistic,
    Pid,
}

impl FromStr for ControllerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logistic" => Ok(ControllerKind::Logistic),
            "pid" => Ok(ControllerKind::Pid),
            _ => Err(format!("unknown controller '{}' (use logistic or pid)", s)),
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ControllerKind::Logistic => f.write_str("logistic"),
            ControllerKind::Pid => f.write_str("pid"),
        }
    }
}

/// Temperature thresholds in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// At or below: fan off
    pub off: Temperature,
    /// At or above: fan regulated
    pub on: Temperature,
    /// At or below (while regulated): minimal duty cycle
    pub low: Temperature,
    /// At or above: maximal duty cycle
    pub high: Temperature,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub chip: u32,
    pub channel: u32,
    pub startup_seconds: u64,
    pub loop_interval_seconds: u64,
    pub monitored_device_pattern: String,
    pub window_capacity: usize,
    pub temp_low: Temperature,
    pub temp_high: Temperature,
    pub temp_off: Temperature,
    pub temp_on: Temperature,
    pub duty_min_percent: u8,
    pub duty_max_percent: u8,
    pub period_ns: u64,
    pub controller_kind: ControllerKind,
    pub full_speed_override: bool,
    /// Gains in nanoseconds of duty cycle per degree
    pub pid_kp: f64,
    pub pid_ki: f64,
    pub pid_kd: f64,
    /// Fixed PID setpoint; derived from the warmup temperature when absent
    pub pid_ideal_temp: Option<Temperature>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chip: 0,
            channel: 0,
            startup_seconds: 10,
            loop_interval_seconds: 5,
            monitored_device_pattern: "cpu".to_string(),
            window_capacity: 6,
            temp_low: 45,
            temp_high: 78,
            temp_off: 0,
            temp_on: 1,
            duty_min_percent: 49,
            duty_max_percent: 100,
            period_ns: 25_000_000,
            controller_kind: ControllerKind::Logistic,
            full_speed_override: false,
            pid_kp: 400_000.0,
            pid_ki: 20_000.0,
            pid_kd: 200_000.0,
            pid_ideal_temp: None,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> error::Result<Self> {
        toml::from_str(text).map_err(|e| ErrorKind::Config(e.to_string()).into())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> error::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|_| {
            ErrorKind::Config(format!("cannot read configuration file {}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Check the invariants the control loop depends on
    pub fn validate(&self) -> error::Result<()> {
        if self.temp_on <= self.temp_off {
            return Err(ErrorKind::Config(format!(
                "temp_on ({}) must be greater than temp_off ({})",
                self.temp_on, self.temp_off
            ))
            .into());
        }
        if self.temp_low >= self.temp_high {
            return Err(ErrorKind::Config(format!(
                "temp_low ({}) must be less than temp_high ({})",
                self.temp_low, self.temp_high
            ))
            .into());
        }
        if self.window_capacity < 2 {
            return Err(ErrorKind::Config(format!(
                "window_capacity ({}) must be at least 2",
                self.window_capacity
            ))
            .into());
        }
        if self.duty_min_percent > 49 {
            return Err(ErrorKind::Config(format!(
                "duty_min_percent ({}) must be within 0..=49",
                self.duty_min_percent
            ))
            .into());
        }
        if !(50..=100).contains(&self.duty_max_percent) {
            return Err(ErrorKind::Config(format!(
                "duty_max_percent ({}) must be within 50..=100",
                self.duty_max_percent
            ))
            .into());
        }
        if self.period_ns == 0 {
            return Err(ErrorKind::Config("period_ns must be positive".to_string()).into());
        }
        for (name, gain) in [
            ("pid_kp", self.pid_kp),
            ("pid_ki", self.pid_ki),
            ("pid_kd", self.pid_kd),
        ] {
            if !gain.is_finite() {
                return Err(
                    ErrorKind::Config(format!("{} ({}) must be finite", name, gain)).into(),
                );
            }
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            off: self.temp_off,
            on: self.temp_on,
            low: self.temp_low,
            high: self.temp_high,
        }
    }

    pub fn startup(&self) -> Duration {
        Duration::from_secs(self.startup_seconds)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval_seconds)
    }

    /// Temperature is sampled unless the fan is forced to full speed
    pub fn monitoring_enabled(&self) -> bool {
        !self.full_speed_override
    }
}
