//! System-wide constants for the RWP workspace.
//!
//! Single source of truth for numeric limits and default paths.

use static_assertions::const_assert;

/// Default control period in microseconds (1 kHz = 1000 µs).
pub const CONTROL_PERIOD_US: u32 = 1000;

/// Smallest accepted control period [µs].
pub const CONTROL_PERIOD_US_MIN: u32 = 100;

/// Largest accepted control period [µs].
pub const CONTROL_PERIOD_US_MAX: u32 = 20_000;

/// Lower clamp applied to every measured `dt` [s].
///
/// Protects finite differences against a zero or negative clock reading.
pub const MIN_DT_S: f64 = 1e-4;

/// Default hysteresis band for angle unwrapping [turns].
pub const UNWRAP_THRESHOLD_DEFAULT: f64 = 0.5;

/// Default number of consecutive ticks a failed sensor read may be bridged
/// with the last good sample before the supervisor is told.
pub const SENSOR_FAULT_HOLD_TICKS_DEFAULT: u32 = 1;

/// Default telemetry emission interval [cycles] (100 = 10 Hz at 1 kHz).
pub const TELEMETRY_INTERVAL_DEFAULT: u32 = 100;

/// Default settle delay before the rest sample is captured [ms].
pub const SETTLE_DELAY_MS_DEFAULT: u64 = 1000;

/// Pause between clearing drive errors and bringing up the bus [ms].
pub const BUS_INIT_PAUSE_MS: u64 = 200;

/// Default session length [s].
pub const RUN_SECONDS_DEFAULT: f64 = 600.0;

/// Longest accepted session [s] (one week).
pub const RUN_SECONDS_MAX: f64 = 7.0 * 86_400.0;

/// Default configuration file path (relative to the working directory).
pub const DEFAULT_CONFIG_PATH: &str = "config/pendulum.toml";

const_assert!(CONTROL_PERIOD_US_MIN <= CONTROL_PERIOD_US);
const_assert!(CONTROL_PERIOD_US <= CONTROL_PERIOD_US_MAX);
const_assert!(SENSOR_FAULT_HOLD_TICKS_DEFAULT >= 1);
const_assert!(TELEMETRY_INTERVAL_DEFAULT > 0);
const_assert!(RUN_SECONDS_DEFAULT <= RUN_SECONDS_MAX);
