//! PID controller for coil current commands.
//!
//! One controller per cage axis. The integral term is accumulated per call
//! (the loop runs on a fixed tick, so the period is folded into `ki`), and
//! is clamped against the output bounds with a back-solve so a saturated
//! axis recovers as soon as the error changes sign.

/// Proportional-integral-derivative controller with output clamping and
/// integral anti-windup.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    integral: f64,
    prev_error: f64,
    output_min: f64,
    output_max: f64,
}

impl PidController {
    /// Create a controller with the given gains and unbounded output.
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            prev_error: 0.0,
            output_min: f64::NEG_INFINITY,
            output_max: f64::INFINITY,
        }
    }

    /// Set the output bounds.
    ///
    /// `min` must be strictly less than `max`.
    pub fn set_output_limits(&mut self, min: f64, max: f64) {
        assert!(min < max, "output limits must satisfy min < max");
        self.output_min = min;
        self.output_max = max;
    }

    /// Replace the gains, keeping accumulated state and bounds.
    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Compute one bounded control output.
    ///
    /// The integral term is clamped to the violated bound before the terms
    /// are combined, and the accumulator is back-solved to the clamped
    /// value so it cannot wind up while the output is saturated.
    pub fn calculate(&mut self, setpoint: f64, measurement: f64) -> f64 {
        let error = setpoint - measurement;

        let p = self.kp * error;

        self.integral += error;
        let mut i = self.ki * self.integral;
        if i > self.output_max {
            i = self.output_max;
            self.integral = self.backsolved_integral(self.output_max);
        } else if i < self.output_min {
            i = self.output_min;
            self.integral = self.backsolved_integral(self.output_min);
        }

        let d = self.kd * (error - self.prev_error);

        let output = (p + i + d).clamp(self.output_min, self.output_max);
        self.prev_error = error;
        output
    }

    /// Clear accumulated integral and error history.
    ///
    /// Gains and output bounds are untouched.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    fn backsolved_integral(&self, bound: f64) -> f64 {
        if self.ki != 0.0 {
            bound / self.ki
        } else {
            0.0
        }
    }
}
