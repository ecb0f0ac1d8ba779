//! Hardware abstraction contracts.
//!
//! The controller talks to exactly two collaborators: an absolute angle
//! sensor behind a serial bus and a motor driver on a CAN-style link. Both
//! are synchronous from the control loop's point of view; the driver's own
//! link pump runs as a separate future supplied by the binary.

pub mod driver;
pub mod types;
