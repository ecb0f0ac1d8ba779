//! Integration test: configuration files on disk.

use std::io::Write;

use rwp_common::config::{ConfigError, ConfigLoader};
use rwp_control_unit::config::load_config;
use rwp_hal::SimulationFile;

const SHIPPED: &str = include_str!("../../../config/pendulum.toml");

fn write(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn shipped_config_is_valid() {
    let file = write(SHIPPED);
    let loaded = load_config(file.path()).unwrap();
    assert_eq!(loaded.config.timing.control_period_us, 1000);
    assert!(loaded.config.limits.torque_limit > 0.0);
    // A failed read is bridged for one tick only.
    assert_eq!(loaded.config.sensor.fault_hold_ticks, 1);

    let sim = SimulationFile::load(file.path()).unwrap();
    sim.simulation.validate().unwrap();
    assert!(sim.simulation.plant.gravity > 0.0);
}

#[test]
fn zero_link_period_is_rejected() {
    let file = write(&SHIPPED.replace("link_period_us = 1000", "link_period_us = 0"));
    let sim = SimulationFile::load(file.path()).unwrap();
    assert!(matches!(
        sim.simulation.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn missing_file_is_reported() {
    let err = load_config(std::path::Path::new("/nonexistent/pendulum.toml")).unwrap_err();
    assert_eq!(err, ConfigError::FileNotFound);
}

#[test]
fn unknown_torque_unit_is_rejected_before_startup() {
    let file = write(
        r#"
[drive]
torque_unit = "furlongs"

[limits]
torque_limit = 0.5
fallback_angle = 0.6

[law]
kind = "pid"
"#,
    );
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::InvalidUnitConfig(_))
    ));
}

#[test]
fn non_finite_gain_is_rejected() {
    let file = write(
        r#"
[limits]
torque_limit = 0.5
fallback_angle = 0.6

[law]
kind = "sliding_mode"
c = inf
u_max = 0.3
"#,
    );
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::InvalidLawConfig(_))
    ));
}
