//! Integration test: sessions ended by the safety supervisor.
//!
//! Every stop must estop the drive exactly once and report the first cause.

use std::future::pending;
use std::time::Duration;

use rwp_control_unit::cycle::SessionOutcome;
use rwp_control_unit::error::SessionError;
use rwp_control_unit::safety::supervisor::{StopReason, SupervisorState};
use rwp_hal::{DriveScaling, FaultConfig, SimulationConfig};

use super::common::{PD_LAW, ZERO_LAW, controller_toml, started, zero_gravity};

fn tilted(angle: f64) -> SimulationConfig {
    SimulationConfig {
        initial_angle: angle,
        ..SimulationConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn large_tilt_is_a_fall() {
    let mut rig = started(&controller_toml(PD_LAW, 1.0), tilted(1.0)).await;
    let link = rig.take_link();
    let report = rig.runner.run_session(link.run(), pending()).await.unwrap();

    match report.outcome {
        SessionOutcome::SafetyStop(StopReason::FallDetected { theta, limit }) => {
            assert!(theta > 0.6);
            assert_eq!(limit, 0.6);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(report.outcome.exit_code(), 2);
    assert_eq!(report.estop_count, 1);
    assert_eq!(rig.runner.motor().estop_count(), 1);
    assert!(rig.runner.motor().is_estopped());
    assert!(rig.runner.telemetry().snapshots.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unbalanced_pendulum_falls_over_time() {
    let mut rig = started(&controller_toml(ZERO_LAW, 5.0), SimulationConfig::default()).await;
    let link = rig.take_link();
    let report = rig.runner.run_session(link.run(), pending()).await.unwrap();

    assert!(matches!(
        report.outcome,
        SessionOutcome::SafetyStop(StopReason::FallDetected { .. })
    ));
    let ticks = rig.runner.telemetry().snapshots.len();
    assert!(ticks > 100 && ticks < 1000, "fell after {ticks} ticks");
}

#[tokio::test(start_paused = true)]
async fn cancellation_estops_once() {
    let mut rig = started(&controller_toml(PD_LAW, 5.0), SimulationConfig::default()).await;
    let link = rig.take_link();
    let report = rig
        .runner
        .run_session(link.run(), tokio::time::sleep(Duration::from_millis(50)))
        .await
        .unwrap();

    assert_eq!(report.outcome, SessionOutcome::SafetyStop(StopReason::Cancelled));
    assert_eq!(report.estop_count, 1);
    assert_eq!(
        rig.runner.supervisor().state(),
        SupervisorState::Stopped(StopReason::Cancelled)
    );
    let ticks = rig.runner.telemetry().snapshots.len();
    assert!((45..=55).contains(&ticks), "{ticks} ticks before cancel");
}

#[tokio::test(start_paused = true)]
async fn rejected_torque_is_an_actuator_fault() {
    let mut sim = zero_gravity();
    sim.faults = FaultConfig {
        torque_reject_after: Some(10),
        ..FaultConfig::default()
    };
    let mut rig = started(&controller_toml(ZERO_LAW, 1.0), sim).await;
    let link = rig.take_link();
    let report = rig.runner.run_session(link.run(), pending()).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Fault(StopReason::ActuatorFault));
    assert_eq!(report.outcome.exit_code(), 3);
    assert_eq!(report.estop_count, 1);
    assert_eq!(rig.runner.telemetry().snapshots.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn persistent_sensor_loss_is_a_sensor_fault() {
    let mut sim = zero_gravity();
    sim.faults = FaultConfig {
        sensor_fail_after: Some(5),
        ..FaultConfig::default()
    };
    let mut rig = started(&controller_toml(ZERO_LAW, 1.0), sim).await;
    let link = rig.take_link();
    let report = rig.runner.run_session(link.run(), pending()).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Fault(StopReason::SensorFault));
    assert_eq!(report.estop_count, 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_link_is_link_lost() {
    let mut sim = zero_gravity();
    sim.faults = FaultConfig {
        link_drop_after_ms: Some(30),
        ..FaultConfig::default()
    };
    let mut rig = started(&controller_toml(ZERO_LAW, 1.0), sim).await;
    let link = rig.take_link();
    let report = rig.runner.run_session(link.run(), pending()).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Fault(StopReason::LinkLost));
    assert_eq!(report.estop_count, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_estop_surfaces_as_error() {
    let mut sim = tilted(1.0);
    sim.faults = FaultConfig {
        estop_fails: true,
        ..FaultConfig::default()
    };
    let mut rig = started(&controller_toml(PD_LAW, 1.0), sim).await;
    let link = rig.take_link();
    let res = rig.runner.run_session(link.run(), pending()).await;

    match res {
        Err(SessionError::EstopFailed { reason, .. }) => {
            assert!(matches!(reason, StopReason::FallDetected { .. }));
        }
        other => panic!("unexpected result {other:?}"),
    }
    // The supervisor still considers the session stopped.
    assert!(!rig.runner.supervisor().is_armed());

    // The calibration went with the failed session.
    assert!(!rig.runner.is_calibrated());
    let relink = rig.bench.link(DriveScaling::default());
    let again = rig.runner.run_session(relink.run(), pending()).await;
    assert!(matches!(again, Err(SessionError::NotCalibrated)));
}

#[tokio::test(start_paused = true)]
async fn second_stop_does_not_estop_again() {
    let mut rig = started(&controller_toml(PD_LAW, 1.0), tilted(1.0)).await;
    let link = rig.take_link();
    rig.runner.run_session(link.run(), pending()).await.unwrap();

    let again = rig.runner.emergency_stop(StopReason::Cancelled).unwrap();
    assert!(matches!(again, StopReason::FallDetected { .. }));
    assert_eq!(rig.runner.motor().estop_count(), 1);
}
