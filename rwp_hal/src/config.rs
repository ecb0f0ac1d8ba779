//! `[simulation]` section of the controller configuration file.
//!
//! The controller ignores this section; the binary loads it separately when
//! running against the simulated bench.

use rwp_common::config::ConfigError;
use serde::{Deserialize, Serialize};

use crate::drivers::simulation::PlantParams;

/// Whole-file wrapper so the section can be read from the shared TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationFile {
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub plant: PlantParams,
    /// Tilt applied when the pendulum is released [rad].
    #[serde(default = "default_initial_angle")]
    pub initial_angle: f64,
    /// Encoder reading at upright [turns].
    #[serde(default = "default_mounting_offset")]
    pub mounting_offset: f64,
    /// Drive link heartbeat / physics step period [µs].
    #[serde(default = "default_link_period_us")]
    pub link_period_us: u32,
    #[serde(default)]
    pub faults: FaultConfig,
}

fn default_initial_angle() -> f64 {
    0.02
}
fn default_mounting_offset() -> f64 {
    0.37
}
fn default_link_period_us() -> u32 {
    1000
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            plant: PlantParams::default(),
            initial_angle: default_initial_angle(),
            mounting_offset: default_mounting_offset(),
            link_period_us: default_link_period_us(),
            faults: FaultConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Reject parameters that would stall the link or make the plant
    /// produce non-finite state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link_period_us == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.link_period_us must be non-zero".to_string(),
            ));
        }
        let p = &self.plant;
        for (name, value) in [
            ("pendulum_inertia", p.pendulum_inertia),
            ("wheel_inertia", p.wheel_inertia),
            ("mass", p.mass),
            ("com_length", p.com_length),
            ("max_torque", p.max_torque),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "simulation.plant.{name} {value} must be positive"
                )));
            }
        }
        for (name, value) in [("gravity", p.gravity), ("friction", p.friction)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "simulation.plant.{name} {value} must be non-negative"
                )));
            }
        }
        for (name, value) in [
            ("initial_angle", self.initial_angle),
            ("mounting_offset", self.mounting_offset),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "simulation.{name} {value} must be finite"
                )));
            }
        }
        Ok(())
    }
}

/// Injected collaborator faults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Sensor reads start failing after this many successful reads.
    #[serde(default)]
    pub sensor_fail_after: Option<u64>,
    /// Number of consecutive failed reads (unbounded if absent).
    #[serde(default)]
    pub sensor_fail_count: Option<u64>,
    /// Wheel velocity feedback always unavailable.
    #[serde(default)]
    pub velocity_unavailable: bool,
    /// Torque writes are rejected after this many accepted writes.
    #[serde(default)]
    pub torque_reject_after: Option<u64>,
    /// The estop command itself fails.
    #[serde(default)]
    pub estop_fails: bool,
    /// The link task stops after this many milliseconds.
    #[serde(default)]
    pub link_drop_after_ms: Option<u64>,
}
