//! Torque and velocity unit conversion between physical and drive-native units.
//!
//! All conversions are pure. Unit modes are parsed once at startup; an
//! unrecognized mode never reaches the hot loop.

use core::f64::consts::TAU;
use std::str::FromStr;

use rwp_common::config::ConfigError;
use rwp_common::control_unit::config::DriveConfig;

/// Native torque unit of the motor driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TorqueUnit {
    /// Drive accepts torque directly [Nm].
    PhysicalTorque,
    /// Drive accepts current [A]; `torque = current × torque_constant`.
    Current { torque_constant: f64 },
}

/// Native velocity unit of the drive's feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityUnit {
    /// [rad/s]
    AngularRate,
    /// [turns/s]
    RotationalRate,
}

/// Torque mode as named in configuration, before the constant is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TorqueMode {
    PhysicalTorque,
    Current,
}

impl FromStr for TorqueMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "physical-torque" | "Nm" => Ok(Self::PhysicalTorque),
            "current" | "A" => Ok(Self::Current),
            other => Err(ConfigError::InvalidUnitConfig(format!(
                "unknown torque unit '{other}' (expected 'physical-torque' or 'current')"
            ))),
        }
    }
}

impl FromStr for VelocityUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "angular-rate" | "rad_s" => Ok(Self::AngularRate),
            "rotational-rate" | "turns_s" => Ok(Self::RotationalRate),
            other => Err(ConfigError::InvalidUnitConfig(format!(
                "unknown velocity unit '{other}' (expected 'angular-rate' or 'rotational-rate')"
            ))),
        }
    }
}

/// Validated unit conversion parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    torque: TorqueUnit,
    velocity: VelocityUnit,
}

impl UnitConverter {
    /// Build a converter from the drive section.
    ///
    /// # Errors
    /// `ConfigError::InvalidUnitConfig` for an unknown mode or a non-positive
    /// torque constant in current mode.
    pub fn new(drive: &DriveConfig) -> Result<Self, ConfigError> {
        let torque = match drive.torque_unit.parse::<TorqueMode>()? {
            TorqueMode::PhysicalTorque => TorqueUnit::PhysicalTorque,
            TorqueMode::Current => {
                let kt = drive.torque_constant;
                if !(kt.is_finite() && kt > 0.0) {
                    return Err(ConfigError::InvalidUnitConfig(format!(
                        "torque_constant {kt} must be positive in current mode"
                    )));
                }
                TorqueUnit::Current {
                    torque_constant: kt,
                }
            }
        };
        let velocity = drive.velocity_unit.parse::<VelocityUnit>()?;
        Ok(Self { torque, velocity })
    }

    pub const fn from_units(torque: TorqueUnit, velocity: VelocityUnit) -> Self {
        Self { torque, velocity }
    }

    #[inline]
    pub const fn torque_unit(&self) -> TorqueUnit {
        self.torque
    }

    #[inline]
    pub const fn velocity_unit(&self) -> VelocityUnit {
        self.velocity
    }

    /// Physical torque [Nm] → drive setpoint.
    #[inline]
    pub fn to_drive_units(&self, torque_nm: f64) -> f64 {
        match self.torque {
            TorqueUnit::PhysicalTorque => torque_nm,
            TorqueUnit::Current { torque_constant } => torque_nm / torque_constant,
        }
    }

    /// Drive setpoint → physical torque [Nm].
    #[inline]
    pub fn from_drive_units(&self, value: f64) -> f64 {
        match self.torque {
            TorqueUnit::PhysicalTorque => value,
            TorqueUnit::Current { torque_constant } => value * torque_constant,
        }
    }

    /// Drive velocity feedback → [rad/s].
    #[inline]
    pub fn from_velocity_units(&self, raw: f64) -> f64 {
        match self.velocity {
            VelocityUnit::AngularRate => raw,
            VelocityUnit::RotationalRate => raw * TAU,
        }
    }

    /// [rad/s] → drive velocity units.
    #[inline]
    pub fn to_velocity_units(&self, rad_s: f64) -> f64 {
        match self.velocity {
            VelocityUnit::AngularRate => rad_s,
            VelocityUnit::RotationalRate => rad_s / TAU,
        }
    }

    /// Torque limit [Nm] expressed in drive units.
    #[inline]
    pub fn drive_limit(&self, torque_limit_nm: f64) -> f64 {
        self.to_drive_units(torque_limit_nm).abs()
    }
}
