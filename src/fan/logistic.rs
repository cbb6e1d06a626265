//! Duty cycle following a logistic curve of the chip temperature.
//!
//! The upper duty cycle bound is the asymptote of the curve. The midpoint is derived from the
//! window mean rather than the latest sample so that single noisy readings move the curve less.

use super::window::ThermalWindow;
use super::{DutyCycleBounds, DutyCycleController};
use crate::sensor::Temperature;

/// Steepness numerator
const A: f64 = 1.0;
/// Steepness denominator
const B: f64 = 8.0;
/// Temperature the midpoint is measured from
const CRITICAL_TEMPERATURE: Temperature = 100;

/// `l / (1 + e^(-(a/b)(x - x0)))`
pub fn curve(l: f64, x: f64, x0: f64, a: f64, b: f64) -> f64 {
    l / (1.0 + (-(a / b) * (x - x0)).exp())
}

#[derive(Debug, Clone, Default)]
pub struct LogisticControl;

impl LogisticControl {
    pub fn new() -> Self {
        Self
    }

    /// Curve midpoint for the given window
    pub fn midpoint(window: &ThermalWindow) -> f64 {
        (window.mean() - CRITICAL_TEMPERATURE).abs() as f64
    }
}

impl DutyCycleController for LogisticControl {
    fn name(&self) -> &'static str {
        "logistic"
    }

    fn compute(
        &mut self,
        window: &ThermalWindow,
        bounds: DutyCycleBounds,
        _current_duty_cycle: u64,
    ) -> u64 {
        let proposed = curve(
            bounds.max() as f64,
            window.latest() as f64,
            Self::midpoint(window),
            A,
            B,
        );
        bounds.clamp(proposed).0
    }
}
