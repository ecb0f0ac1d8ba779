//! PD/PID balancing law with wheel-rate damping.
//!
//! ```text
//! torque = −(s·Kp·θ + Ki·∫θ dt + s·Kd·θ̇ + Kw·ω_wheel)
//! s      = max(0, 1 − gain_schedule·|θ|)
//! ```
//!
//! The setpoint is upright, so the error is θ itself. Zero Ki disables the
//! integral, zero `gain_schedule` keeps s = 1.
//!
//! Gain scheduling is a heuristic: shrinking Kp and Kd at large excursions
//! softens saturation kicks but carries no stability guarantee. The scale is
//! recomputed from |θ| every tick and never accumulates.

use rwp_common::config::ConfigError;
use rwp_common::control_unit::config::PidGainsConfig;

use super::{ControlLaw, LawInput, require_finite, require_non_negative};

/// Integrator state, preserved across ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
    integral: f64,
}

impl PidState {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub const fn integral(&self) -> f64 {
        self.integral
    }
}

/// Validated PID gains.
#[derive(Debug, Clone, Copy)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Wheel-rate damping gain.
    pub kw: f64,
    pub gain_schedule: f64,
    /// |∫θ dt| bound (0 = unbounded).
    pub integral_limit: f64,
}

impl PidGains {
    pub fn from_config(cfg: &PidGainsConfig) -> Result<Self, ConfigError> {
        require_finite("kp", cfg.kp)?;
        require_finite("ki", cfg.ki)?;
        require_finite("kd", cfg.kd)?;
        require_finite("kw", cfg.kw)?;
        require_non_negative("gain_schedule", cfg.gain_schedule)?;
        require_non_negative("integral_limit", cfg.integral_limit)?;
        Ok(Self {
            kp: cfg.kp,
            ki: cfg.ki,
            kd: cfg.kd,
            kw: cfg.kw,
            gain_schedule: cfg.gain_schedule,
            integral_limit: cfg.integral_limit,
        })
    }
}

/// Compute one PID tick.
///
/// Returns the unsaturated torque [Nm].
#[inline]
pub fn pid_compute(state: &mut PidState, gains: &PidGains, input: &LawInput) -> f64 {
    let theta = input.state.theta;

    // ── I term ──────────────────────────────────────────────
    let i_term = if gains.ki != 0.0 {
        state.integral += theta * input.dt;
        if gains.integral_limit > 0.0 {
            state.integral = state
                .integral
                .clamp(-gains.integral_limit, gains.integral_limit);
        }
        gains.ki * state.integral
    } else {
        state.integral = 0.0;
        0.0
    };

    // ── Gain schedule ───────────────────────────────────────
    let scale = (1.0 - gains.gain_schedule * theta.abs()).max(0.0);

    let p_term = scale * gains.kp * theta;
    let d_term = scale * gains.kd * input.state.theta_dot;
    let w_term = gains.kw * input.wheel_rate;

    -(p_term + i_term + d_term + w_term)
}

/// [`ControlLaw`] wrapper around [`pid_compute`].
#[derive(Debug, Clone)]
pub struct PidLaw {
    gains: PidGains,
    state: PidState,
}

impl PidLaw {
    pub fn new(cfg: &PidGainsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            gains: PidGains::from_config(cfg)?,
            state: PidState::default(),
        })
    }

    pub fn integral(&self) -> f64 {
        self.state.integral()
    }
}

impl ControlLaw for PidLaw {
    #[inline]
    fn compute(&mut self, input: &LawInput) -> f64 {
        pid_compute(&mut self.state, &self.gains, input)
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn name(&self) -> &'static str {
        "pid"
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::PendulumState;

    const DT: f64 = 0.001;

    fn input(theta: f64, theta_dot: f64, wheel_rate: f64) -> LawInput {
        LawInput {
            state: PendulumState { theta, theta_dot },
            wheel_rate,
            dt: DT,
        }
    }

    fn law(kp: f64, ki: f64, kd: f64, kw: f64) -> PidLaw {
        PidLaw::new(&PidGainsConfig {
            kp,
            ki,
            kd,
            kw,
            ..PidGainsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn pd_with_wheel_damping_matches_formula() {
        let mut l = law(-120.0, 0.0, -20.0, 10.0);
        let out = l.compute(&input(0.05, -0.2, 3.0));
        let expected = -(-120.0 * 0.05 + -20.0 * -0.2 + 10.0 * 3.0);
        assert!((out - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_gains_produce_zero() {
        let mut l = law(0.0, 0.0, 0.0, 0.0);
        assert_eq!(l.compute(&input(0.4, 1.0, 5.0)), 0.0);
    }

    #[test]
    fn integral_accumulates_theta_dt() {
        let mut l = law(0.0, 100.0, 0.0, 0.0);
        let mut out = 0.0;
        for _ in 0..10 {
            out = l.compute(&input(1.0, 0.0, 0.0));
        }
        assert!((l.integral() - 0.01).abs() < 1e-12);
        assert!((out + 1.0).abs() < 1e-10);
    }

    #[test]
    fn integral_limit_bounds_windup() {
        let mut l = PidLaw::new(&PidGainsConfig {
            ki: 1.0,
            integral_limit: 0.005,
            ..PidGainsConfig::default()
        })
        .unwrap();
        for _ in 0..1000 {
            l.compute(&input(1.0, 0.0, 0.0));
        }
        assert!((l.integral() - 0.005).abs() < 1e-12);
    }

    #[test]
    fn reset_clears_integral() {
        let mut l = law(0.0, 1.0, 0.0, 0.0);
        for _ in 0..100 {
            l.compute(&input(0.5, 0.0, 0.0));
        }
        assert!(l.integral() > 0.0);
        l.reset();
        assert_eq!(l.integral(), 0.0);
    }

    #[test]
    fn gain_schedule_shrinks_pd_terms_without_memory() {
        let mut l = PidLaw::new(&PidGainsConfig {
            kp: 10.0,
            kd: 2.0,
            gain_schedule: 1.0,
            ..PidGainsConfig::default()
        })
        .unwrap();
        // |θ| = 0.5 → scale 0.5
        let out = l.compute(&input(0.5, 1.0, 0.0));
        assert!((out + 0.5 * (10.0 * 0.5 + 2.0 * 1.0)).abs() < 1e-12);
        // Large excursion floors the scale at zero.
        assert_eq!(l.compute(&input(2.0, 1.0, 0.0)), 0.0);
        // Back near upright, full gains return.
        let out = l.compute(&input(0.0, 1.0, 0.0));
        assert!((out + 2.0).abs() < 1e-12);
    }

    #[test]
    fn negative_schedule_rejected() {
        assert!(
            PidLaw::new(&PidGainsConfig {
                gain_schedule: -0.1,
                ..PidGainsConfig::default()
            })
            .is_err()
        );
    }
}
