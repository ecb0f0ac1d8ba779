//! Configuration structures for the balancing controller.
//!
//! All config types use `serde::Deserialize` for TOML loading.
//! Optional fields use `#[serde(default)]` so a minimal file only needs the
//! `[limits]` and `[law]` sections.
//!
//! Unit modes are kept as strings here and parsed by the control unit at
//! startup, so an unknown mode surfaces as `InvalidUnitConfig` rather than a
//! generic parse error.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    CONTROL_PERIOD_US, CONTROL_PERIOD_US_MAX, CONTROL_PERIOD_US_MIN, RUN_SECONDS_DEFAULT,
    RUN_SECONDS_MAX, SENSOR_FAULT_HOLD_TICKS_DEFAULT, SETTLE_DELAY_MS_DEFAULT,
    TELEMETRY_INTERVAL_DEFAULT, UNWRAP_THRESHOLD_DEFAULT,
};
use crate::hal::types::SensorAddress;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    /// Safety limits. Required: there is no safe default torque limit.
    pub limits: LimitsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// Active control law. Required.
    pub law: LawConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ControllerConfig {
    /// Validate structural bounds.
    ///
    /// Unit modes and gain sets are checked by the control unit when it
    /// builds the converter and the law.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.sensor.validate()?;
        self.drive.validate()?;
        self.limits.validate()?;
        self.timing.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}

// ─── Sensor ─────────────────────────────────────────────────────────

/// Bit layout of the two bytes returned by the absolute encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BitLayout {
    /// High byte is the coarse fraction (/255), low byte a 6-bit fine part.
    #[default]
    #[serde(rename = "split_8_6")]
    Split8x6,
    /// 12-bit count packed across both bytes: `((hi << 6) | (lo >> 2)) & 0xFFF`.
    #[serde(rename = "packed_12")]
    Packed12,
}

/// Absolute angle sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_bus")]
    pub bus_id: u8,
    #[serde(default = "default_sensor_device")]
    pub device_address: u8,
    #[serde(default = "default_sensor_register")]
    pub register_address: u8,
    #[serde(default)]
    pub bit_layout: BitLayout,
    /// Unwrap hysteresis band [turns]; applied symmetrically as ±threshold.
    #[serde(default = "default_unwrap_threshold")]
    pub unwrap_threshold: f64,
    /// Consecutive failed reads bridged with the last sample before escalation.
    /// 1 holds for a single tick; larger values tolerate longer dropouts.
    #[serde(default = "default_fault_hold_ticks")]
    pub fault_hold_ticks: u32,
}

fn default_sensor_bus() -> u8 {
    1
}
fn default_sensor_device() -> u8 {
    0x40
}
fn default_sensor_register() -> u8 {
    0xFE
}
fn default_unwrap_threshold() -> f64 {
    UNWRAP_THRESHOLD_DEFAULT
}
fn default_fault_hold_ticks() -> u32 {
    SENSOR_FAULT_HOLD_TICKS_DEFAULT
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            bus_id: default_sensor_bus(),
            device_address: default_sensor_device(),
            register_address: default_sensor_register(),
            bit_layout: BitLayout::default(),
            unwrap_threshold: default_unwrap_threshold(),
            fault_hold_ticks: default_fault_hold_ticks(),
        }
    }
}

impl SensorConfig {
    pub fn address(&self) -> SensorAddress {
        SensorAddress {
            bus_id: self.bus_id,
            device_address: self.device_address,
            register_address: self.register_address,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.unwrap_threshold;
        if !(t.is_finite() && t > 0.0 && t < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "sensor.unwrap_threshold {t} must lie strictly inside (0, 1)"
            )));
        }
        if self.fault_hold_ticks == 0 {
            return Err(ConfigError::ValidationError(
                "sensor.fault_hold_ticks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Drive ──────────────────────────────────────────────────────────

/// Motor driver addressing, gearing and native units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub bus_id: u8,
    /// Sensor turns per pendulum turn.
    #[serde(default = "default_gear_ratio")]
    pub gear_ratio: f64,
    /// `physical-torque` (Nm) or `current` (A).
    #[serde(default = "default_torque_unit")]
    pub torque_unit: String,
    /// Motor torque constant [Nm/A], used in `current` mode only.
    #[serde(default = "default_torque_constant")]
    pub torque_constant: f64,
    /// `angular-rate` (rad/s) or `rotational-rate` (turns/s).
    #[serde(default = "default_velocity_unit")]
    pub velocity_unit: String,
}

fn default_gear_ratio() -> f64 {
    1.0
}
fn default_torque_unit() -> String {
    "physical-torque".to_string()
}
fn default_torque_constant() -> f64 {
    0.06
}
fn default_velocity_unit() -> String {
    "angular-rate".to_string()
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            bus_id: 0,
            gear_ratio: default_gear_ratio(),
            torque_unit: default_torque_unit(),
            torque_constant: default_torque_constant(),
            velocity_unit: default_velocity_unit(),
        }
    }
}

impl DriveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gear_ratio.is_finite() && self.gear_ratio > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "drive.gear_ratio {} must be positive",
                self.gear_ratio
            )));
        }
        Ok(())
    }
}

// ─── Limits ─────────────────────────────────────────────────────────

/// Actuation and fall-detection limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Symmetric torque saturation [Nm].
    pub torque_limit: f64,
    /// |theta| beyond which the pendulum is considered fallen [rad].
    pub fallback_angle: f64,
}

impl LimitsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.torque_limit.is_finite() && self.torque_limit > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "limits.torque_limit {} must be positive",
                self.torque_limit
            )));
        }
        if !(self.fallback_angle.is_finite() && self.fallback_angle > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "limits.fallback_angle {} must be positive",
                self.fallback_angle
            )));
        }
        Ok(())
    }
}

// ─── Timing ─────────────────────────────────────────────────────────

/// Loop cadence and session length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_control_period_us")]
    pub control_period_us: u32,
    #[serde(default = "default_run_seconds")]
    pub run_seconds: f64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Per-call latency budget for sensor reads / drive writes [µs].
    /// Defaults to half the control period.
    #[serde(default)]
    pub io_budget_us: Option<u32>,
}

fn default_control_period_us() -> u32 {
    CONTROL_PERIOD_US
}
fn default_run_seconds() -> f64 {
    RUN_SECONDS_DEFAULT
}
fn default_settle_delay_ms() -> u64 {
    SETTLE_DELAY_MS_DEFAULT
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            control_period_us: default_control_period_us(),
            run_seconds: default_run_seconds(),
            settle_delay_ms: default_settle_delay_ms(),
            io_budget_us: None,
        }
    }
}

impl TimingConfig {
    pub fn control_period(&self) -> Duration {
        Duration::from_micros(self.control_period_us as u64)
    }

    pub fn io_budget(&self) -> Duration {
        let us = self.io_budget_us.unwrap_or(self.control_period_us / 2);
        Duration::from_micros(us as u64)
    }

    /// `None` when `run_seconds` does not fit a [`Duration`].
    pub fn run_duration(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.run_seconds).ok()
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_period_us < CONTROL_PERIOD_US_MIN
            || self.control_period_us > CONTROL_PERIOD_US_MAX
        {
            return Err(ConfigError::ValidationError(format!(
                "timing.control_period_us {} out of range [{}, {}]",
                self.control_period_us, CONTROL_PERIOD_US_MIN, CONTROL_PERIOD_US_MAX
            )));
        }
        if !(self.run_seconds.is_finite() && self.run_seconds > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "timing.run_seconds {} must be positive",
                self.run_seconds
            )));
        }
        if self.run_seconds > RUN_SECONDS_MAX {
            return Err(ConfigError::ValidationError(format!(
                "timing.run_seconds {} exceeds {RUN_SECONDS_MAX}",
                self.run_seconds
            )));
        }
        if let Some(budget) = self.io_budget_us {
            if budget == 0 || budget > self.control_period_us {
                return Err(ConfigError::ValidationError(format!(
                    "timing.io_budget_us {budget} must be in [1, control_period_us]"
                )));
            }
        }
        Ok(())
    }
}

// ─── Estimator ──────────────────────────────────────────────────────

/// State estimator selection and tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorConfig {
    /// Finite difference followed by an exponential low-pass on the rate.
    LowPass {
        /// Smoothing factor in [0, 1]; 1 = raw difference, 0 = frozen rate.
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
    /// Two-state constant-velocity Kalman filter.
    Kalman {
        #[serde(default = "default_q_theta")]
        q_theta: f64,
        #[serde(default = "default_q_omega")]
        q_omega: f64,
        #[serde(default = "default_r_meas")]
        r_meas: f64,
    },
}

fn default_alpha() -> f64 {
    0.5
}
fn default_q_theta() -> f64 {
    1e-3
}
fn default_q_omega() -> f64 {
    5e-2
}
fn default_r_meas() -> f64 {
    1e-2
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::LowPass {
            alpha: default_alpha(),
        }
    }
}

// ─── Control Law ────────────────────────────────────────────────────

/// Active control law and its gain set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LawConfig {
    /// PD/PID with wheel-rate damping and optional gain scheduling.
    Pid(PidGainsConfig),
    /// Bang-bang sliding-mode law with randomized dither.
    SlidingMode(SlidingModeConfig),
    /// Outer PID plus an inner wheel-velocity PI loop.
    Cascade(CascadeConfig),
}

/// `torque = −(Kp·θ + Ki·∫θ + Kd·θ̇ + Kw·ω_wheel)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGainsConfig {
    #[serde(default)]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    #[serde(default)]
    pub kw: f64,
    /// Fractional Kp/Kd reduction per radian of |θ| (0 = fixed gains).
    #[serde(default)]
    pub gain_schedule: f64,
    /// Bound on the integral accumulator [rad·s] (0 = unbounded).
    #[serde(default)]
    pub integral_limit: f64,
}

/// `u = U_max·sign(θ + C·θ̇) ± dither`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlidingModeConfig {
    /// Sliding surface slope C [s].
    pub c: f64,
    /// Switching magnitude [Nm].
    pub u_max: f64,
    /// Chattering-reduction dither magnitude [Nm].
    #[serde(default)]
    pub dither: f64,
    /// Boundary-layer width; 0 keeps the pure switching law.
    #[serde(default)]
    pub boundary_layer: f64,
    /// Fixed RNG seed for reproducible dither.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Outer position/velocity PID plus inner wheel-velocity PI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub outer: PidGainsConfig,
    pub wheel_kp: f64,
    #[serde(default)]
    pub wheel_ki: f64,
    /// Wheel velocity target [rad/s].
    #[serde(default)]
    pub wheel_setpoint: f64,
}

// ─── Telemetry ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Emit one snapshot every N cycles.
    #[serde(default = "default_telemetry_interval")]
    pub interval_cycles: u32,
}

fn default_telemetry_interval() -> u32 {
    TELEMETRY_INTERVAL_DEFAULT
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_cycles: default_telemetry_interval(),
        }
    }
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_cycles == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.interval_cycles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
