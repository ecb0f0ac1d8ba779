//! # RWP Control Unit Library
//!
//! Balancing controller for a reaction-wheel inverted pendulum. One
//! fixed-period loop reads the absolute encoder, reconstructs the tilt
//! angle, filters it, runs the configured control law and commands wheel
//! torque, with a safety supervisor able to stop everything at any tick.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ─► decode ─► unwrap ─► calibrate ─► estimate ─► law ─► saturate ─► drive
//!                                              │
//!                                              └─► supervisor (fall / fault)
//! ```
//!
//! The pipeline itself ([`balance`]) is free of I/O; [`cycle`] owns the
//! collaborators and the timing.

pub mod balance;
pub mod config;
pub mod control;
pub mod cycle;
pub mod error;
pub mod estimator;
pub mod safety;
pub mod sensor;
pub mod telemetry;
pub mod units;
pub mod unwrap;
