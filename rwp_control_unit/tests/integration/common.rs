//! Shared rig: controller config + simulated bench wired together.

use rwp_control_unit::config::{LoadedConfig, load_config_from_str};
use rwp_control_unit::cycle::CycleRunner;
use rwp_control_unit::telemetry::RecordingTelemetry;
use rwp_hal::{
    DriveScaling, MotorLink, SimulatedEncoder, SimulatedMotor, SimulationBench, SimulationConfig,
};

pub type Runner = CycleRunner<SimulatedEncoder, SimulatedMotor, RecordingTelemetry>;

pub struct Rig {
    pub bench: SimulationBench,
    pub runner: Runner,
    pub link: Option<MotorLink>,
}

impl Rig {
    pub fn take_link(&mut self) -> MotorLink {
        self.link.take().expect("link already taken")
    }
}

/// Controller file with short timing and the given law section.
pub fn controller_toml(law: &str, run_seconds: f64) -> String {
    format!(
        r#"
[limits]
torque_limit = 0.5
fallback_angle = 0.6

[timing]
control_period_us = 1000
run_seconds = {run_seconds}
settle_delay_ms = 100

[law]
{law}
"#
    )
}

pub const PD_LAW: &str = r#"kind = "pid"
kp = -2.0
kd = -0.1"#;

pub const ZERO_LAW: &str = r#"kind = "pid""#;

pub fn scaling(loaded: &LoadedConfig) -> DriveScaling {
    DriveScaling {
        nm_per_unit: loaded.units.from_drive_units(1.0),
        units_per_rad_s: loaded.units.to_velocity_units(1.0),
    }
}

pub fn rig(controller: &str, simulation: SimulationConfig) -> Rig {
    let loaded = load_config_from_str(controller).expect("valid controller config");
    rig_from(loaded, simulation)
}

/// Rig around an already-loaded configuration.
pub fn rig_from(loaded: LoadedConfig, simulation: SimulationConfig) -> Rig {
    let scaling = scaling(&loaded);
    let bench = SimulationBench::new(simulation);
    let sensor = bench.encoder(
        loaded.config.sensor.address(),
        loaded.config.sensor.bit_layout,
        loaded.config.drive.gear_ratio,
    );
    let motor = bench.motor(scaling);
    let link = bench.link(scaling);
    let runner = CycleRunner::with_telemetry(loaded, sensor, motor, RecordingTelemetry::default());
    Rig {
        bench,
        runner,
        link: Some(link),
    }
}

/// Startup + calibration, then hand back the rig ready for `run_session`.
pub async fn started(controller: &str, simulation: SimulationConfig) -> Rig {
    calibrated(rig(controller, simulation)).await
}

pub async fn calibrated(mut rig: Rig) -> Rig {
    rig.runner.start().await.expect("startup");
    rig.runner.calibrate().await.expect("calibration");
    rig
}

pub fn zero_gravity() -> SimulationConfig {
    let mut sim = SimulationConfig::default();
    sim.plant.gravity = 0.0;
    sim
}
