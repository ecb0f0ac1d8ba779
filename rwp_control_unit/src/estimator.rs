//! State estimation: filtered angle and angular rate from unwrapped samples.
//!
//! Two interchangeable strategies behind [`StateEstimator`], chosen once from
//! configuration by [`build_estimator`]. Both bootstrap on the first sample
//! with `theta_dot = 0`.

pub mod kalman;
pub mod lowpass;

use rwp_common::config::ConfigError;
use rwp_common::control_unit::config::EstimatorConfig;

pub use kalman::KalmanEstimator;
pub use lowpass::LowPassEstimator;

/// Estimated pendulum state, zero-referenced to upright.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PendulumState {
    /// Angle from upright [rad]. Continuous, unbounded.
    pub theta: f64,
    /// Angular rate [rad/s].
    pub theta_dot: f64,
}

/// Estimator contract: `predict(dt)` then `update(theta_raw)` once per tick.
pub trait StateEstimator {
    /// Propagate internal state by `dt` seconds (already clamped by the caller).
    fn predict(&mut self, dt: f64);

    /// Fold in one measurement [rad] and return the current estimate.
    fn update(&mut self, theta_raw: f64) -> PendulumState;

    /// Discard all internal state; the next update bootstraps again.
    fn reset(&mut self);

    fn name(&self) -> &'static str;
}

/// Build the configured estimator.
///
/// # Errors
/// `ConfigError::ValidationError` for α outside [0, 1] or non-positive
/// Kalman noise terms.
pub fn build_estimator(config: &EstimatorConfig) -> Result<Box<dyn StateEstimator>, ConfigError> {
    match *config {
        EstimatorConfig::LowPass { alpha } => Ok(Box::new(LowPassEstimator::new(alpha)?)),
        EstimatorConfig::Kalman {
            q_theta,
            q_omega,
            r_meas,
        } => Ok(Box::new(KalmanEstimator::new(q_theta, q_omega, r_meas)?)),
    }
}
