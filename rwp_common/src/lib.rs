//! RWP Common Library
//!
//! Shared constants, configuration types and collaborator contracts for the
//! reaction-wheel pendulum workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - System-wide numeric limits and defaults
//! - [`config`] - TOML loading trait, shared config and error type
//! - [`control_unit`] - Controller configuration sections
//! - [`hal`] - Sensor / motor-driver traits and the `HalError` type
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use rwp_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod control_unit;
pub mod hal;
pub mod prelude;
