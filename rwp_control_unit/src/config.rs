//! Configuration loading with full startup validation.
//!
//! Parses the TOML file, checks structural bounds, then dry-builds the unit
//! converter, estimator and law so every configuration error is reported
//! before any hardware is touched.

use std::path::Path;

use rwp_common::config::{ConfigError, ConfigLoader};
use rwp_common::control_unit::config::ControllerConfig;

use crate::control::build_law;
use crate::estimator::build_estimator;
use crate::units::UnitConverter;

/// Validated configuration, ready for runtime use.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ControllerConfig,
    pub units: UnitConverter,
}

/// Load and validate the controller configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    validate(ControllerConfig::load(path)?)
}

/// Parse and validate an in-memory TOML document.
pub fn load_config_from_str(content: &str) -> Result<LoadedConfig, ConfigError> {
    validate(ControllerConfig::load_str(content)?)
}

/// Validate an already-parsed configuration.
pub fn validate(config: ControllerConfig) -> Result<LoadedConfig, ConfigError> {
    config.validate()?;
    let units = UnitConverter::new(&config.drive)?;
    build_estimator(&config.estimator)?;
    build_law(&config.law)?;
    Ok(LoadedConfig { config, units })
}
