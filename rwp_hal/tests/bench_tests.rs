//! Simulated bench integration tests.
//!
//! Drive the encoder, motor and link together the way the controller does,
//! without the controller itself.

use std::f64::consts::TAU;
use std::time::Duration;

use rwp_common::prelude::*;
use rwp_hal::drivers::simulation::encode_turns;
use rwp_hal::{DriveScaling, FaultConfig, SimulationBench, SimulationConfig, SimulationFile};

const ADDR: SensorAddress = SensorAddress {
    bus_id: 1,
    device_address: 0x40,
    register_address: 0xFE,
};

fn bench(config: SimulationConfig) -> SimulationBench {
    SimulationBench::new(config)
}

#[test]
fn held_pendulum_reads_mounting_offset() {
    let b = bench(SimulationConfig::default());
    let mut enc = b.encoder(ADDR, BitLayout::Split8x6, 1.0);
    let bytes = enc.read_angle_bytes(&ADDR).unwrap();
    assert_eq!(bytes, encode_turns(0.37, BitLayout::Split8x6));
    assert_eq!(enc.good_reads(), 1);
}

#[test]
fn wrong_address_is_a_read_error() {
    let b = bench(SimulationConfig::default());
    let mut enc = b.encoder(ADDR, BitLayout::Packed12, 1.0);
    let other = SensorAddress {
        device_address: 0x41,
        ..ADDR
    };
    assert!(matches!(
        enc.read_angle_bytes(&other),
        Err(HalError::SensorRead(_))
    ));
}

#[test]
fn bounded_sensor_outage_recovers() {
    let b = bench(SimulationConfig {
        faults: FaultConfig {
            sensor_fail_after: Some(2),
            sensor_fail_count: Some(3),
            ..FaultConfig::default()
        },
        ..SimulationConfig::default()
    });
    let mut enc = b.encoder(ADDR, BitLayout::Split8x6, 1.0);
    let results: Vec<bool> = (0..7).map(|_| enc.read_angle_bytes(&ADDR).is_ok()).collect();
    assert_eq!(results, [true, true, false, false, false, true, true]);
    assert_eq!(enc.failed_reads(), 3);
}

#[tokio::test(start_paused = true)]
async fn released_pendulum_falls_without_torque() {
    let b = bench(SimulationConfig {
        initial_angle: 0.05,
        ..SimulationConfig::default()
    });
    let link = b.link(DriveScaling::default());
    let _ = tokio::time::timeout(DEFAULT_CONTROL_PERIOD * 500, link.run()).await;
    let plant = b.plant();
    assert!(!plant.is_held());
    assert!(plant.phi() > 0.05);
    assert!(plant.phi_dot() > 0.0);
}

#[tokio::test(start_paused = true)]
async fn encoder_tracks_released_pendulum() {
    let b = bench(SimulationConfig {
        initial_angle: 0.1,
        mounting_offset: 0.0,
        ..SimulationConfig::default()
    });
    let mut enc = b.encoder(ADDR, BitLayout::Packed12, 1.0);
    let link = b.link(DriveScaling::default());
    let _ = tokio::time::timeout(Duration::from_millis(50), link.run()).await;

    let [hi, lo] = enc.read_angle_bytes(&ADDR).unwrap();
    let counts = (((hi as u32) << 6) | ((lo as u32) >> 2)) & 0xFFF;
    let turns = counts as f64 / 4096.0;
    let phi = b.plant().phi();
    assert!((turns - phi / TAU).abs() <= 1.0 / 4096.0);
}

#[tokio::test(start_paused = true)]
async fn estop_removes_torque_from_plant() {
    let b = bench(SimulationConfig::default());
    let mut motor = b.motor(DriveScaling::default());
    motor.clear_errors().unwrap();
    motor.init_bus().unwrap();
    motor
        .set_controller_mode(ControllerMode::TorqueControl)
        .unwrap();
    motor.set_torque(0.2).unwrap();

    let link = b.link(DriveScaling::default());
    let handle = tokio::spawn(link.run());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!((b.plant().torque() - 0.2).abs() < 1e-12);
    let spun_up = motor.velocity().unwrap();
    assert!(spun_up > 0.0);

    motor.estop().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(b.plant().torque(), 0.0);
    assert_eq!(motor.estop_count(), 1);
    handle.abort();
}

#[test]
fn simulation_section_parses_from_controller_file() {
    let toml = r#"
[limits]
torque_limit = 0.5
fallback_angle = 0.6

[law]
kind = "pid"

[simulation]
initial_angle = 0.1

[simulation.plant]
gravity = 0.0

[simulation.faults]
estop_fails = true
"#;
    let file = SimulationFile::load_str(toml).unwrap();
    assert_eq!(file.simulation.initial_angle, 0.1);
    assert_eq!(file.simulation.plant.gravity, 0.0);
    assert!(file.simulation.faults.estop_fails);
    assert_eq!(file.simulation.link_period_us, 1000);
}
