//! Discrete PID controller whose output is added to a configurable offset, so that control variable
//! of "0" means "keep the current duty cycle". The integral term is dropped whenever the offset
//! output had to be clamped to the limits (anti-windup).

use pid_control::Controller;

pub struct OffsetPIDController {
    p_gain: f64,
    i_gain: f64,
    d_gain: f64,
    target: f64,
    offset: f64,
    min: f64,
    max: f64,
    integral: f64,
    previous: Option<f64>,
    saturated: bool,
}

impl OffsetPIDController {
    pub fn new(p_gain: f64, i_gain: f64, d_gain: f64, target: f64) -> Self {
        Self {
            p_gain,
            i_gain,
            d_gain,
            target,
            offset: 0.0,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            integral: 0.0,
            previous: None,
            saturated: false,
        }
    }

    /// Limits apply to the offset output
    pub fn set_limits(&mut self, min: f64, max: f64) {
        self.min = min;
        self.max = max;
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    /// Override the measurement the derivative term is computed against
    pub fn set_previous(&mut self, previous: Option<f64>) {
        self.previous = previous;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// `true` if the last update had to be clamped
    pub fn saturated(&self) -> bool {
        self.saturated
    }
}

impl Controller for OffsetPIDController {
    fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    fn target(&self) -> f64 {
        self.target
    }

    /// One step per sample; `delta_t` is not used because the gains are per sample.
    /// The output is truncated to a whole number before clamping.
    fn update(&mut self, value: f64, _delta_t: f64) -> f64 {
        let p_error = value - self.target;
        self.integral += p_error;
        let d_error = self.previous.map_or(0.0, |previous| value - previous);
        self.previous = Some(value);

        let proposed = (self.offset
            + self.p_gain * p_error
            + self.i_gain * self.integral
            + self.d_gain * d_error)
            .trunc();

        self.saturated = proposed.is_nan() || proposed < self.min || proposed > self.max;
        if self.saturated {
            self.integral = 0.0;
            // NaN ends up at `min`
            proposed.max(self.min).min(self.max)
        } else {
            proposed
        }
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.previous = None;
        self.saturated = false;
    }
}
