//! Shared simulated bench: one plant, one drive, one encoder.
//!
//! The encoder, the motor handle and the link task all see the same state
//! through an `Arc<Mutex<_>>`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rwp_common::control_unit::config::BitLayout;
use rwp_common::hal::types::{ControllerMode, SensorAddress};

use super::encoder::SimulatedEncoder;
use super::motor::{DriveScaling, MotorLink, SimulatedMotor};
use super::physics::PendulumPlant;
use crate::config::SimulationConfig;

/// Drive-side state as the firmware would hold it.
#[derive(Debug, Clone, Default)]
pub(crate) struct DriveState {
    pub bus_up: bool,
    pub mode: Option<ControllerMode>,
    /// Latched setpoint in drive units.
    pub setpoint: f64,
    pub estopped: bool,
    pub estop_count: u32,
    pub torque_writes: u64,
    pub heartbeats: u64,
}

#[derive(Debug)]
pub(crate) struct BenchState {
    pub plant: PendulumPlant,
    pub drive: DriveState,
}

/// Factory for the collaborators of one simulated session.
#[derive(Clone)]
pub struct SimulationBench {
    state: Arc<Mutex<BenchState>>,
    config: SimulationConfig,
}

impl SimulationBench {
    pub fn new(config: SimulationConfig) -> Self {
        let state = BenchState {
            plant: PendulumPlant::new(config.plant),
            drive: DriveState::default(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn encoder(
        &self,
        address: SensorAddress,
        layout: BitLayout,
        gear_ratio: f64,
    ) -> SimulatedEncoder {
        SimulatedEncoder::new(
            Arc::clone(&self.state),
            address,
            layout,
            gear_ratio,
            self.config.mounting_offset,
            self.config.faults.sensor_fail_after,
            self.config.faults.sensor_fail_count,
        )
    }

    pub fn motor(&self, scaling: DriveScaling) -> SimulatedMotor {
        SimulatedMotor::new(Arc::clone(&self.state), scaling, &self.config.faults)
    }

    /// Background link task; steps the plant once per heartbeat.
    pub fn link(&self, scaling: DriveScaling) -> MotorLink {
        MotorLink::new(
            Arc::clone(&self.state),
            scaling,
            Duration::from_micros(self.config.link_period_us as u64),
            self.config.initial_angle,
            self.config.faults.link_drop_after_ms.map(Duration::from_millis),
        )
    }

    /// Snapshot of the plant.
    pub fn plant(&self) -> PendulumPlant {
        self.state.lock().plant.clone()
    }

    /// Link periods elapsed since release.
    pub fn heartbeats(&self) -> u64 {
        self.state.lock().drive.heartbeats
    }

    #[cfg(test)]
    pub(crate) fn state_for_tests(&self) -> &Arc<Mutex<BenchState>> {
        &self.state
    }
}
