//! Plain data types exchanged with hardware collaborators.

use serde::{Deserialize, Serialize};

/// Bus location of the absolute angle sensor's position register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorAddress {
    pub bus_id: u8,
    pub device_address: u8,
    pub register_address: u8,
}

impl std::fmt::Display for SensorAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bus {} dev 0x{:02X} reg 0x{:02X}",
            self.bus_id, self.device_address, self.register_address
        )
    }
}

/// Motor driver control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControllerMode {
    /// Setpoint is a torque (or current), the only mode the balancer uses.
    #[default]
    TorqueControl,
    VelocityControl,
    PositionControl,
}
