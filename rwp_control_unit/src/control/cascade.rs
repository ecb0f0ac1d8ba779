//! Cascade law: outer PID on the pendulum plus an inner wheel-velocity PI
//! loop that bleeds off stored wheel momentum.
//!
//! ```text
//! e      = ω_wheel − ω_setpoint
//! torque = pid(θ, θ̇, ω_wheel) − (Kwp·e + Kwi·∫e dt)
//! ```

use rwp_common::config::ConfigError;
use rwp_common::control_unit::config::CascadeConfig;

use super::pid::{PidGains, PidState, pid_compute};
use super::{ControlLaw, LawInput, require_finite};

#[derive(Debug, Clone)]
pub struct CascadeLaw {
    outer: PidGains,
    outer_state: PidState,
    wheel_kp: f64,
    wheel_ki: f64,
    wheel_setpoint: f64,
    wheel_integral: f64,
}

impl CascadeLaw {
    pub fn new(cfg: &CascadeConfig) -> Result<Self, ConfigError> {
        require_finite("wheel_kp", cfg.wheel_kp)?;
        require_finite("wheel_ki", cfg.wheel_ki)?;
        require_finite("wheel_setpoint", cfg.wheel_setpoint)?;
        Ok(Self {
            outer: PidGains::from_config(&cfg.outer)?,
            outer_state: PidState::default(),
            wheel_kp: cfg.wheel_kp,
            wheel_ki: cfg.wheel_ki,
            wheel_setpoint: cfg.wheel_setpoint,
            wheel_integral: 0.0,
        })
    }

    pub fn wheel_integral(&self) -> f64 {
        self.wheel_integral
    }
}

impl ControlLaw for CascadeLaw {
    fn compute(&mut self, input: &LawInput) -> f64 {
        let outer = pid_compute(&mut self.outer_state, &self.outer, input);

        let error = input.wheel_rate - self.wheel_setpoint;
        if self.wheel_ki != 0.0 {
            self.wheel_integral += error * input.dt;
        }
        let inner = -(self.wheel_kp * error + self.wheel_ki * self.wheel_integral);

        outer + inner
    }

    fn reset(&mut self) {
        self.outer_state.reset();
        self.wheel_integral = 0.0;
    }

    fn name(&self) -> &'static str {
        "cascade"
    }
}
