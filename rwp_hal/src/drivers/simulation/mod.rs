//! Software bench: pendulum physics behind a simulated encoder and drive.
//!
//! Used for development and the integration tests; real hardware plugs in
//! through the same [`AngleSensor`](rwp_common::hal::driver::AngleSensor)
//! and [`MotorDriver`](rwp_common::hal::driver::MotorDriver) traits.

mod bench;
mod encoder;
mod motor;
mod physics;

pub use bench::SimulationBench;
pub use encoder::{SimulatedEncoder, encode_turns};
pub use motor::{DriveScaling, MotorLink, SimulatedMotor};
pub use physics::{PendulumPlant, PlantParams};
