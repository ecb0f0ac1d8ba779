//! # RWP HAL
//!
//! Collaborators for the balancing controller: sensor and drive
//! implementations behind the traits in `rwp_common::hal::driver`.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 SimulationBench                        │
//! │  ┌──────────────┐   ┌──────────────┐   ┌────────────┐  │
//! │  │ Simulated    │   │ Simulated    │   │ MotorLink  │  │
//! │  │ Encoder      │   │ Motor        │   │ (async)    │  │
//! │  └──────┬───────┘   └──────┬───────┘   └─────┬──────┘  │
//! │         └──────────► PendulumPlant ◄─────────┘         │
//! └────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod drivers;

pub use config::{FaultConfig, SimulationConfig, SimulationFile};
pub use drivers::simulation::{
    DriveScaling, MotorLink, PendulumPlant, PlantParams, SimulatedEncoder, SimulatedMotor,
    SimulationBench,
};
