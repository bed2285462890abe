//! Scalar Kalman filter for magnetometer noise rejection.
//!
//! Each cage axis runs one independent filter over its measurement stream.
//! The model is the one-dimensional constant-state form: state transition
//! `a` and observation `h` are both 1.0 for the sensors in use, so the
//! filter reduces to an optimally-weighted exponential smoother whose gain
//! adapts to the configured process and measurement noise.

/// Recursive scalar state estimator.
///
/// Predict/update over a single state variable with scalar covariance.
/// The covariance stays finite and non-negative for any finite inputs as
/// long as `r > 0`, since the gain is confined to `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ScalarKalman {
    /// State transition coefficient (1.0 for the sensors in use).
    a: f64,
    /// Observation coefficient (1.0 for the sensors in use).
    h: f64,
    /// Process noise variance.
    q: f64,
    /// Measurement noise variance.
    r: f64,
    state: f64,
    covariance: f64,
}

/// Default initial error covariance.
pub const DEFAULT_COVARIANCE: f64 = 1.0;
/// Default process noise variance.
pub const DEFAULT_PROCESS_NOISE: f64 = 1.0;
/// Default measurement noise variance.
pub const DEFAULT_MEASUREMENT_NOISE: f64 = 100.0;

impl ScalarKalman {
    /// Create a filter with default noise configuration.
    pub fn new(initial_state: f64) -> Self {
        Self::with_noise(
            initial_state,
            DEFAULT_PROCESS_NOISE,
            DEFAULT_MEASUREMENT_NOISE,
        )
    }

    /// Create a filter with explicit process and measurement noise.
    pub fn with_noise(initial_state: f64, q: f64, r: f64) -> Self {
        Self {
            a: 1.0,
            h: 1.0,
            q,
            r,
            state: initial_state,
            covariance: DEFAULT_COVARIANCE,
        }
    }

    /// Incorporate one measurement and return the new estimate.
    pub fn update(&mut self, measurement: f64) -> f64 {
        self.update_with_control(measurement, 0.0)
    }

    /// Incorporate one measurement with a known control input applied to
    /// the state since the previous update.
    pub fn update_with_control(&mut self, measurement: f64, control_input: f64) -> f64 {
        // Predict
        let x_pred = self.a * self.state + control_input;
        let p_pred = self.a * self.a * self.covariance + self.q;

        // Gain
        let k = (p_pred * self.h) / (self.h * p_pred * self.h + self.r);

        // Correct
        self.state = x_pred + k * (measurement - self.h * x_pred);
        self.covariance = (1.0 - k * self.h) * p_pred;

        self.state
    }

    /// Overwrite the estimate and covariance, discarding history.
    ///
    /// Used when seeding from the first real sample and after reconnects.
    pub fn reset(&mut self, initial_state: f64, initial_covariance: f64) {
        self.state = initial_state;
        self.covariance = initial_covariance;
    }

    /// Current state estimate.
    pub fn state(&self) -> f64 {
        self.state
    }

    /// Current error covariance.
    pub fn covariance(&self) -> f64 {
        self.covariance
    }
}
