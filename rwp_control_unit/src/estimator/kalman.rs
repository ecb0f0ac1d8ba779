//! Two-state constant-velocity Kalman filter on `[theta, omega]`.
//!
//! ```text
//! F = [1 dt; 0 1]   H = [1 0]   Q = diag(q_theta, q_omega)   R = r_meas
//! predict: x = F·x,  P = F·P·Fᵀ + Q
//! update:  S = H·P·Hᵀ + R,  K = P·Hᵀ/S,  x += K·(z − H·x),  P = (I − K·H)·P
//! ```
//!
//! The first measurement initializes the mean directly; `predict` is a no-op
//! until then. Fixed-size arrays keep the step allocation-free.

use rwp_common::config::ConfigError;

use super::{PendulumState, StateEstimator};

type Mat2 = [[f64; 2]; 2];

const IDENTITY: Mat2 = [[1.0, 0.0], [0.0, 1.0]];

#[derive(Debug, Clone, Copy)]
pub struct KalmanEstimator {
    x: [f64; 2],
    p: Mat2,
    q_theta: f64,
    q_omega: f64,
    r_meas: f64,
    initialized: bool,
}

impl KalmanEstimator {
    pub fn new(q_theta: f64, q_omega: f64, r_meas: f64) -> Result<Self, ConfigError> {
        for (name, v) in [("q_theta", q_theta), ("q_omega", q_omega), ("r_meas", r_meas)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "estimator.{name} {v} must be positive"
                )));
            }
        }
        Ok(Self {
            x: [0.0; 2],
            p: IDENTITY,
            q_theta,
            q_omega,
            r_meas,
            initialized: false,
        })
    }

    /// Current covariance, for diagnostics.
    pub fn covariance(&self) -> Mat2 {
        self.p
    }

    fn state(&self) -> PendulumState {
        PendulumState {
            theta: self.x[0],
            theta_dot: self.x[1],
        }
    }
}

impl StateEstimator for KalmanEstimator {
    fn predict(&mut self, dt: f64) {
        if !self.initialized {
            return;
        }
        let [theta, omega] = self.x;
        self.x = [theta + omega * dt, omega];

        // F·P·Fᵀ expanded for F = [1 dt; 0 1].
        let [[p00, p01], [p10, p11]] = self.p;
        let n00 = p00 + dt * (p10 + p01) + dt * dt * p11 + self.q_theta;
        let n01 = p01 + dt * p11;
        let n10 = p10 + dt * p11;
        let n11 = p11 + self.q_omega;
        self.p = [[n00, n01], [n10, n11]];
    }

    fn update(&mut self, theta_raw: f64) -> PendulumState {
        if !self.initialized {
            self.x = [theta_raw, 0.0];
            self.p = IDENTITY;
            self.initialized = true;
            return self.state();
        }

        let [[p00, p01], [p10, p11]] = self.p;
        let s = p00 + self.r_meas;
        let k0 = p00 / s;
        let k1 = p10 / s;

        let innovation = theta_raw - self.x[0];
        self.x[0] += k0 * innovation;
        self.x[1] += k1 * innovation;

        // (I − K·H)·P with H = [1 0].
        self.p = [
            [(1.0 - k0) * p00, (1.0 - k0) * p01],
            [p10 - k1 * p00, p11 - k1 * p01],
        ];

        self.state()
    }

    fn reset(&mut self) {
        self.x = [0.0; 2];
        self.p = IDENTITY;
        self.initialized = false;
    }

    fn name(&self) -> &'static str {
        "kalman"
    }
}
