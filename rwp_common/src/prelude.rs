//! Prelude module for common re-exports.
//!
//! ```rust
//! use rwp_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::control_unit::config::{
    BitLayout, ControllerConfig, EstimatorConfig, LawConfig, LimitsConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CONTROL_PERIOD_US, MIN_DT_S};

// ─── Hardware ───────────────────────────────────────────────────────
pub use crate::hal::driver::{AngleSensor, HalError, MotorDriver};
pub use crate::hal::types::{ControllerMode, SensorAddress};

/// Default control period as Duration.
pub const DEFAULT_CONTROL_PERIOD: Duration = Duration::from_micros(CONTROL_PERIOD_US as u64);
