//! Simulated torque-mode motor driver and its communication link.
//!
//! [`SimulatedMotor`] is the command surface the controller owns.
//! [`MotorLink`] is the long-running heartbeat task: every period it applies
//! the latched setpoint to the plant, steps the physics and refreshes
//! feedback. Without the link nothing moves.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rwp_common::hal::driver::{HalError, MotorDriver};
use rwp_common::hal::types::ControllerMode;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::bench::BenchState;
use crate::config::FaultConfig;

/// Scale factors between drive units and physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveScaling {
    /// Physical torque per drive torque unit [N·m/unit] (1 in torque mode,
    /// the torque constant in current mode).
    pub nm_per_unit: f64,
    /// Drive velocity units per rad/s (1 for rad/s, 1/2π for turns/s).
    pub units_per_rad_s: f64,
}

impl Default for DriveScaling {
    fn default() -> Self {
        Self {
            nm_per_unit: 1.0,
            units_per_rad_s: 1.0,
        }
    }
}

pub struct SimulatedMotor {
    bench: Arc<Mutex<BenchState>>,
    scaling: DriveScaling,
    velocity_unavailable: bool,
    torque_reject_after: Option<u64>,
    estop_fails: bool,
}

impl SimulatedMotor {
    pub(crate) fn new(
        bench: Arc<Mutex<BenchState>>,
        scaling: DriveScaling,
        faults: &FaultConfig,
    ) -> Self {
        Self {
            bench,
            scaling,
            velocity_unavailable: faults.velocity_unavailable,
            torque_reject_after: faults.torque_reject_after,
            estop_fails: faults.estop_fails,
        }
    }

    /// Estop commands received.
    pub fn estop_count(&self) -> u32 {
        self.bench.lock().drive.estop_count
    }

    /// Accepted torque writes.
    pub fn torque_writes(&self) -> u64 {
        self.bench.lock().drive.torque_writes
    }

    /// Latched setpoint in drive units.
    pub fn setpoint(&self) -> f64 {
        self.bench.lock().drive.setpoint
    }

    pub fn is_estopped(&self) -> bool {
        self.bench.lock().drive.estopped
    }

    pub fn mode(&self) -> Option<ControllerMode> {
        self.bench.lock().drive.mode
    }
}

impl MotorDriver for SimulatedMotor {
    fn clear_errors(&mut self) -> Result<(), HalError> {
        let mut bench = self.bench.lock();
        bench.drive.estopped = false;
        debug!("drive errors cleared");
        Ok(())
    }

    fn init_bus(&mut self) -> Result<(), HalError> {
        self.bench.lock().drive.bus_up = true;
        info!("simulated drive bus up");
        Ok(())
    }

    fn set_controller_mode(&mut self, mode: ControllerMode) -> Result<(), HalError> {
        let mut bench = self.bench.lock();
        if !bench.drive.bus_up {
            return Err(HalError::ActuatorWrite("bus not initialized".to_string()));
        }
        bench.drive.mode = Some(mode);
        Ok(())
    }

    fn set_torque(&mut self, value: f64) -> Result<(), HalError> {
        let mut bench = self.bench.lock();
        let drive = &mut bench.drive;
        if !drive.bus_up {
            return Err(HalError::ActuatorWrite("bus not initialized".to_string()));
        }
        if drive.estopped {
            return Err(HalError::ActuatorWrite("drive is estopped".to_string()));
        }
        if drive.mode != Some(ControllerMode::TorqueControl) {
            return Err(HalError::ActuatorWrite(
                "drive not in torque control".to_string(),
            ));
        }
        if self
            .torque_reject_after
            .is_some_and(|after| drive.torque_writes >= after)
        {
            return Err(HalError::ActuatorWrite("setpoint rejected (injected)".to_string()));
        }
        drive.setpoint = value;
        drive.torque_writes += 1;
        Ok(())
    }

    fn estop(&mut self) -> Result<(), HalError> {
        if self.estop_fails {
            return Err(HalError::LinkDown("estop frame not acknowledged".to_string()));
        }
        let mut bench = self.bench.lock();
        bench.drive.estopped = true;
        bench.drive.estop_count += 1;
        bench.drive.setpoint = 0.0;
        bench.plant.set_torque(0.0);
        warn!("simulated drive estopped");
        Ok(())
    }

    fn velocity(&self) -> Result<f64, HalError> {
        if self.velocity_unavailable {
            return Err(HalError::ActuatorRead("encoder estimate unavailable".to_string()));
        }
        let rate = self.bench.lock().plant.wheel_rate();
        Ok(rate * self.scaling.units_per_rad_s)
    }

    fn position(&self) -> Result<f64, HalError> {
        Ok(self.bench.lock().plant.wheel_angle() / TAU)
    }
}

/// Heartbeat task of the simulated drive.
pub struct MotorLink {
    bench: Arc<Mutex<BenchState>>,
    scaling: DriveScaling,
    period: Duration,
    release_tilt: f64,
    drop_after: Option<Duration>,
}

impl MotorLink {
    pub(crate) fn new(
        bench: Arc<Mutex<BenchState>>,
        scaling: DriveScaling,
        period: Duration,
        release_tilt: f64,
        drop_after: Option<Duration>,
    ) -> Self {
        Self {
            bench,
            scaling,
            period,
            release_tilt,
            drop_after,
        }
    }

    /// Run until the link is dropped. Releases the pendulum on start.
    pub async fn run(self) -> Result<(), HalError> {
        let dt = self.period.as_secs_f64();
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let start = Instant::now();

        self.bench.lock().plant.release(self.release_tilt);
        info!(tilt = self.release_tilt, "pendulum released");

        loop {
            interval.tick().await;
            if let Some(limit) = self.drop_after {
                if start.elapsed() >= limit {
                    warn!("simulated drive link dropped");
                    return Err(HalError::LinkDown("heartbeat lost (injected)".to_string()));
                }
            }

            let mut bench = self.bench.lock();
            let drive = &bench.drive;
            let torque = if drive.estopped || drive.mode != Some(ControllerMode::TorqueControl) {
                0.0
            } else {
                drive.setpoint * self.scaling.nm_per_unit
            };
            bench.plant.set_torque(torque);
            bench.plant.step(dt);
            bench.drive.heartbeats += 1;
        }
    }
}
