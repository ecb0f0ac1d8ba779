//! Physics models for simulation.

mod plant;

pub use plant::{PendulumPlant, PlantParams};
