//! Control law engine.
//!
//! One pluggable [`ControlLaw`] is selected from configuration before the
//! loop starts. Every law returns an unsaturated torque in Nm; clamping to
//! the torque limit happens once, afterwards, in the balance pipeline.

pub mod cascade;
pub mod pid;
pub mod sliding;

use rwp_common::config::ConfigError;
use rwp_common::control_unit::config::LawConfig;

use crate::estimator::PendulumState;

pub use cascade::CascadeLaw;
pub use pid::PidLaw;
pub use sliding::SlidingModeLaw;

/// Per-tick law input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LawInput {
    pub state: PendulumState,
    /// Reaction-wheel angular velocity [rad/s]; 0 when feedback is unavailable.
    pub wheel_rate: f64,
    /// Clamped tick duration [s].
    pub dt: f64,
}

/// A torque law mapping estimated state to a physical torque command.
pub trait ControlLaw {
    /// Compute the raw (unsaturated) torque [Nm].
    fn compute(&mut self, input: &LawInput) -> f64;

    /// Clear accumulated state (integrators).
    fn reset(&mut self);

    fn name(&self) -> &'static str;
}

/// Build the configured law.
///
/// # Errors
/// `ConfigError::InvalidLawConfig` when the gain set is unusable.
pub fn build_law(config: &LawConfig) -> Result<Box<dyn ControlLaw>, ConfigError> {
    Ok(match config {
        LawConfig::Pid(gains) => Box::new(PidLaw::new(gains)?),
        LawConfig::SlidingMode(cfg) => Box::new(SlidingModeLaw::new(cfg)?),
        LawConfig::Cascade(cfg) => Box::new(CascadeLaw::new(cfg)?),
    })
}

pub(crate) fn require_finite(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidLawConfig(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

pub(crate) fn require_non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    require_finite(name, value)?;
    if value < 0.0 {
        return Err(ConfigError::InvalidLawConfig(format!(
            "{name} must be non-negative, got {value}"
        )));
    }
    Ok(())
}
