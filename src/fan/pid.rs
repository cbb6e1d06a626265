//! Implementation of fan control using PID

mod offset_pid;

use super::window::ThermalWindow;
use super::{DutyCycleBounds, DutyCycleController};
use crate::sensor::Temperature;
use offset_pid::OffsetPIDController;

use log::debug;
use pid_control::Controller;

use std::time::Duration;

/// Added to the warmup temperature when no ideal temperature is configured
pub const IDEAL_OFFSET: Temperature = 5;

pub struct PidControl {
    pid: OffsetPIDController,
    interval: Duration,
}

impl PidControl {
    /// Gains are positive: the error is `latest - ideal`, and a hotter chip needs a higher duty
    /// cycle.
    pub fn new(kp: f64, ki: f64, kd: f64, ideal: Temperature, interval: Duration) -> Self {
        Self {
            pid: OffsetPIDController::new(kp, ki, kd, ideal as f64),
            interval,
        }
    }

    /// Ideal temperature derived from the one observed after warmup
    pub fn ideal_from_warmup(warmup_temperature: Temperature) -> Temperature {
        warmup_temperature + IDEAL_OFFSET
    }

    pub fn ideal(&self) -> f64 {
        self.pid.target()
    }

    pub fn integral_error(&self) -> f64 {
        self.pid.integral()
    }
}

impl DutyCycleController for PidControl {
    fn name(&self) -> &'static str {
        "pid"
    }

    fn compute(
        &mut self,
        window: &ThermalWindow,
        bounds: DutyCycleBounds,
        current_duty_cycle: u64,
    ) -> u64 {
        self.pid.set_limits(bounds.min() as f64, bounds.max() as f64);
        self.pid.set_offset(current_duty_cycle as f64);
        self.pid
            .set_previous(window.previous().map(|previous| previous as f64));

        let output = self
            .pid
            .update(window.latest() as f64, self.interval.as_secs_f64());
        if self.pid.saturated() {
            debug!("PID output saturated at {} ns, integral error reset", output);
        }
        bounds.clamp(output).0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn window(samples: &[Temperature]) -> ThermalWindow {
        let mut window = ThermalWindow::new(6);
        for sample in samples {
            window.push(*sample);
        }
        window
    }

    fn bounds() -> DutyCycleBounds {
        DutyCycleBounds::new(12_250_000, 25_000_000).unwrap()
    }

    #[test]
    fn test_ideal_from_warmup() {
        assert_eq!(PidControl::ideal_from_warmup(48), 53);
        let control = PidControl::new(1.0, 1.0, 1.0, 53, Duration::from_secs(5));
        assert_relative_eq!(control.ideal(), 53.0);
    }

    #[test]
    fn test_compute_moves_from_current_duty_cycle() {
        let mut control = PidControl::new(100_000.0, 10_000.0, 50_000.0, 50, Duration::from_secs(5));

        // p = 2, i = 2, d = 52 - 50 = 2
        let duty_cycle = control.compute(&window(&[50, 52]), bounds(), 15_000_000);
        assert_eq!(duty_cycle, 15_000_000 + 200_000 + 20_000 + 100_000);
        assert_relative_eq!(control.integral_error(), 2.0);

        // colder than ideal: p = -3, i = -1, d = 47 - 52 = -5
        let duty_cycle = control.compute(&window(&[50, 52, 47]), bounds(), duty_cycle);
        assert_eq!(duty_cycle, 15_320_000 - 300_000 - 10_000 - 250_000);
        assert_relative_eq!(control.integral_error(), -1.0);
    }

    #[test]
    fn test_derivative_uses_window_history() {
        let mut control = PidControl::new(0.0, 0.0, 1_000.0, 50, Duration::from_secs(5));
        // controller was idle while the window recorded 60 and 62
        let duty_cycle = control.compute(&window(&[40, 60, 62]), bounds(), 20_000_000);
        assert_eq!(duty_cycle, 20_002_000);
    }

    #[test]
    fn test_saturation_resets_integral() {
        let mut control = PidControl::new(1_000_000.0, 100_000.0, 0.0, 50, Duration::from_secs(5));

        let duty_cycle = control.compute(&window(&[70, 75]), bounds(), 24_000_000);
        assert_eq!(duty_cycle, 25_000_000);
        assert_relative_eq!(control.integral_error(), 0.0);

        let duty_cycle = control.compute(&window(&[70, 75, 76]), bounds(), duty_cycle);
        assert_eq!(duty_cycle, 25_000_000);
        assert_relative_eq!(control.integral_error(), 0.0);
    }

    #[test]
    fn test_non_finite_gain_stays_in_bounds() {
        let mut control = PidControl::new(f64::NAN, 0.0, 0.0, 50, Duration::from_secs(5));
        assert_eq!(control.compute(&window(&[60, 61]), bounds(), 20_000_000), 12_250_000);
        assert_relative_eq!(control.integral_error(), 0.0);
    }

    #[test]
    fn test_saturation_low() {
        let mut control = PidControl::new(1_000_000.0, 0.0, 0.0, 60, Duration::from_secs(5));
        let duty_cycle = control.compute(&window(&[50, 46]), bounds(), 13_000_000);
        assert_eq!(duty_cycle, 12_250_000);
        assert_relative_eq!(control.integral_error(), 0.0);
    }
}
