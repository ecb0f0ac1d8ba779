//! Reaction-wheel inverted pendulum dynamics.
//!
//! ```text
//! I_p·φ̈   = m·g·l·sin φ − τ − b·φ̇
//! I_w·ω̇_w = τ
//! ```
//!
//! φ is the tilt from upright, τ the motor torque on the wheel (its reaction
//! acts on the pendulum). Integrated with semi-implicit Euler.
//!
//! The plant starts *held*: the pendulum is fixed upright while the wheel
//! still responds to torque, as when an operator holds it during
//! calibration. [`PendulumPlant::release`] lets it go.

use serde::{Deserialize, Serialize};

/// Physical parameters. Defaults describe a small desktop rig.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlantParams {
    /// Pendulum inertia about the pivot [kg·m²].
    #[serde(default = "default_pendulum_inertia")]
    pub pendulum_inertia: f64,
    /// Pendulum + wheel mass [kg].
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Pivot to centre of mass [m].
    #[serde(default = "default_com_length")]
    pub com_length: f64,
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    /// Viscous pivot friction [N·m·s/rad].
    #[serde(default = "default_friction")]
    pub friction: f64,
    /// Wheel inertia [kg·m²].
    #[serde(default = "default_wheel_inertia")]
    pub wheel_inertia: f64,
    /// Motor torque saturation [N·m].
    #[serde(default = "default_max_torque")]
    pub max_torque: f64,
}

fn default_pendulum_inertia() -> f64 {
    0.006
}
fn default_mass() -> f64 {
    0.5
}
fn default_com_length() -> f64 {
    0.1
}
fn default_gravity() -> f64 {
    9.81
}
fn default_friction() -> f64 {
    0.001
}
fn default_wheel_inertia() -> f64 {
    5e-4
}
fn default_max_torque() -> f64 {
    1.0
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            pendulum_inertia: default_pendulum_inertia(),
            mass: default_mass(),
            com_length: default_com_length(),
            gravity: default_gravity(),
            friction: default_friction(),
            wheel_inertia: default_wheel_inertia(),
            max_torque: default_max_torque(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendulumPlant {
    params: PlantParams,
    /// Tilt from upright [rad].
    phi: f64,
    phi_dot: f64,
    /// Wheel angle [rad] and rate [rad/s].
    wheel_angle: f64,
    wheel_rate: f64,
    /// Applied motor torque [N·m].
    torque: f64,
    held: bool,
}

impl PendulumPlant {
    pub fn new(params: PlantParams) -> Self {
        Self {
            params,
            phi: 0.0,
            phi_dot: 0.0,
            wheel_angle: 0.0,
            wheel_rate: 0.0,
            torque: 0.0,
            held: true,
        }
    }

    pub fn params(&self) -> &PlantParams {
        &self.params
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }

    pub fn phi_dot(&self) -> f64 {
        self.phi_dot
    }

    pub fn wheel_angle(&self) -> f64 {
        self.wheel_angle
    }

    pub fn wheel_rate(&self) -> f64 {
        self.wheel_rate
    }

    pub fn torque(&self) -> f64 {
        self.torque
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Apply a motor torque, saturated to the motor's limit.
    pub fn set_torque(&mut self, torque: f64) {
        let max = self.params.max_torque;
        self.torque = if torque.is_finite() {
            torque.clamp(-max, max)
        } else {
            0.0
        };
    }

    /// Let go of the pendulum, displaced by `tilt` [rad].
    pub fn release(&mut self, tilt: f64) {
        if self.held {
            self.held = false;
            self.phi += tilt;
        }
    }

    /// Advance by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let p = &self.params;
        let tau = self.torque;

        self.wheel_rate += tau / p.wheel_inertia * dt;
        self.wheel_angle += self.wheel_rate * dt;

        if self.held {
            return;
        }
        let gravity = p.mass * p.gravity * p.com_length * self.phi.sin();
        let acc = (gravity - tau - p.friction * self.phi_dot) / p.pendulum_inertia;
        self.phi_dot += acc * dt;
        self.phi += self.phi_dot * dt;
    }
}
