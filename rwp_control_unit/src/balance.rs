//! Per-tick balancing pipeline: unwrap → calibrate → estimate → law → saturate.
//!
//! Hardware-free: the cycle runner does the I/O and feeds samples in. Built
//! once at calibration; dropped at the end of the session.

use rwp_common::config::ConfigError;
use rwp_common::consts::MIN_DT_S;
use rwp_common::control_unit::config::ControllerConfig;

use crate::control::{ControlLaw, LawInput, build_law};
use crate::estimator::{PendulumState, StateEstimator, build_estimator};
use crate::sensor::RawSample;
use crate::units::UnitConverter;
use crate::unwrap::{AngleUnwrapper, Calibration};

/// Saturated command in drive units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActuatorCommand {
    /// Torque [Nm] or current [A], per the drive's torque unit.
    pub magnitude: f64,
    /// The law's output had to be clamped.
    pub clamped: bool,
}

/// Everything one tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepOutput {
    /// Calibrated angle before filtering [rad].
    pub theta_raw: f64,
    pub state: PendulumState,
    /// Unsaturated law output [Nm].
    pub torque_nm: f64,
    pub command: ActuatorCommand,
}

pub struct BalanceController {
    unwrapper: AngleUnwrapper,
    calibration: Calibration,
    estimator: Box<dyn StateEstimator>,
    law: Box<dyn ControlLaw>,
    units: UnitConverter,
    torque_limit: f64,
}

impl BalanceController {
    /// Build the pipeline from configuration, zeroed at `rest`.
    ///
    /// # Errors
    /// Unwrap threshold, estimator tuning or law gains are invalid.
    pub fn new(
        config: &ControllerConfig,
        units: UnitConverter,
        rest: RawSample,
    ) -> Result<Self, ConfigError> {
        let unwrapper = AngleUnwrapper::new(config.sensor.unwrap_threshold, rest)?;
        let calibration = Calibration {
            rest_turns: unwrapper.continuous_turns(),
            gear_ratio: config.drive.gear_ratio,
        };
        Ok(Self {
            unwrapper,
            calibration,
            estimator: build_estimator(&config.estimator)?,
            law: build_law(&config.law)?,
            units,
            torque_limit: config.limits.torque_limit,
        })
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn law_name(&self) -> &'static str {
        self.law.name()
    }

    pub fn estimator_name(&self) -> &'static str {
        self.estimator.name()
    }

    /// Run one tick.
    ///
    /// `wheel_rate` is in rad/s. `dt` is clamped to [`MIN_DT_S`].
    pub fn step(&mut self, sample: RawSample, wheel_rate: f64, dt: f64) -> StepOutput {
        let dt = dt.max(MIN_DT_S);

        let turns = self.unwrapper.update(sample);
        let theta_raw = self.calibration.theta(turns);

        self.estimator.predict(dt);
        let state = self.estimator.update(theta_raw);

        let torque_nm = self.law.compute(&LawInput {
            state,
            wheel_rate,
            dt,
        });

        StepOutput {
            theta_raw,
            state,
            torque_nm,
            command: saturate(torque_nm, self.torque_limit, &self.units),
        }
    }
}

/// Clamp in Nm, convert, then clamp again in drive units.
///
/// The second clamp only matters for rounding in the conversion. A
/// non-finite input passes through unchanged so the caller can detect it.
#[inline]
pub fn saturate(torque_nm: f64, torque_limit: f64, units: &UnitConverter) -> ActuatorCommand {
    let limited = torque_nm.clamp(-torque_limit, torque_limit);
    let drive_limit = units.drive_limit(torque_limit);
    let magnitude = units.to_drive_units(limited).clamp(-drive_limit, drive_limit);
    ActuatorCommand {
        magnitude,
        clamped: limited != torque_nm,
    }
}
