//! Finite difference followed by a first-order low-pass on the rate.
//!
//! ```text
//! raw_rate  = (theta − prev_theta) / dt
//! theta_dot = (1 − α)·theta_dot + α·raw_rate
//! ```
//!
//! α = 1 passes the raw difference through. α = 0 freezes `theta_dot` at its
//! bootstrap value of zero, which removes all rate damping from the law and
//! is almost certainly a misconfiguration.

use rwp_common::config::ConfigError;
use rwp_common::consts::MIN_DT_S;

use super::{PendulumState, StateEstimator};

#[derive(Debug, Clone, Copy)]
pub struct LowPassEstimator {
    alpha: f64,
    prev_theta: Option<f64>,
    theta_dot: f64,
    dt: f64,
}

impl LowPassEstimator {
    pub fn new(alpha: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ConfigError::ValidationError(format!(
                "estimator.alpha {alpha} must lie in [0, 1]"
            )));
        }
        Ok(Self {
            alpha,
            prev_theta: None,
            theta_dot: 0.0,
            dt: MIN_DT_S,
        })
    }
}

impl StateEstimator for LowPassEstimator {
    #[inline]
    fn predict(&mut self, dt: f64) {
        self.dt = dt.max(MIN_DT_S);
    }

    fn update(&mut self, theta_raw: f64) -> PendulumState {
        match self.prev_theta {
            None => self.theta_dot = 0.0,
            Some(prev) => {
                let raw_rate = (theta_raw - prev) / self.dt;
                self.theta_dot = (1.0 - self.alpha) * self.theta_dot + self.alpha * raw_rate;
            }
        }
        self.prev_theta = Some(theta_raw);
        PendulumState {
            theta: theta_raw,
            theta_dot: self.theta_dot,
        }
    }

    fn reset(&mut self) {
        self.prev_theta = None;
        self.theta_dot = 0.0;
        self.dt = MIN_DT_S;
    }

    fn name(&self) -> &'static str {
        "low_pass"
    }
}
