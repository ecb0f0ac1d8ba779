//! Sensor and motor-driver traits plus their error type.
//!
//! This module defines:
//! - `HalError` - failures reported by either collaborator
//! - `AngleSensor` - raw two-byte reads of the encoder register
//! - `MotorDriver` - command and feedback surface of the wheel drive

use crate::hal::types::{ControllerMode, SensorAddress};
use thiserror::Error;

/// Error types for hardware operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HalError {
    /// Sensor register read failed or returned a short frame.
    #[error("Sensor read failed: {0}")]
    SensorRead(String),

    /// Drive feedback (velocity / position) unavailable.
    #[error("Actuator feedback read failed: {0}")]
    ActuatorRead(String),

    /// Torque setpoint or mode command rejected.
    #[error("Actuator write failed: {0}")]
    ActuatorWrite(String),

    /// Bus bring-up or error-clear failed.
    #[error("Bus error: {0}")]
    Bus(String),

    /// The drive's communication link is no longer serviced.
    #[error("Drive link down: {0}")]
    LinkDown(String),
}

/// Absolute angle sensor on a register-addressed serial bus.
pub trait AngleSensor {
    /// Read the two raw bytes `[hi, lo]` of the position register.
    ///
    /// # Errors
    /// `HalError::SensorRead` on any bus failure. Callers treat the sample
    /// as missing for this cycle.
    fn read_angle_bytes(&mut self, addr: &SensorAddress) -> Result<[u8; 2], HalError>;
}

/// Reaction-wheel motor driver.
///
/// # Lifecycle
///
/// 1. `clear_errors()` then `init_bus()` during startup
/// 2. `set_controller_mode(TorqueControl)`
/// 3. `set_torque()` every cycle, `velocity()` as feedback
/// 4. `estop()` on any safety stop
///
/// Torque and velocity values are in the drive's native units; conversion
/// is the caller's job.
pub trait MotorDriver {
    /// Clear latched drive faults.
    fn clear_errors(&mut self) -> Result<(), HalError>;

    /// Bring up the command bus.
    fn init_bus(&mut self) -> Result<(), HalError>;

    fn set_controller_mode(&mut self, mode: ControllerMode) -> Result<(), HalError>;

    /// Latch a new torque (or current) setpoint.
    fn set_torque(&mut self, value: f64) -> Result<(), HalError>;

    /// Emergency stop: de-energize the motor immediately.
    fn estop(&mut self) -> Result<(), HalError>;

    /// Latest wheel velocity feedback in drive units.
    fn velocity(&self) -> Result<f64, HalError>;

    /// Latest wheel position feedback in turns.
    fn position(&self) -> Result<f64, HalError>;
}
