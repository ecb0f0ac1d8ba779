//! Control Unit shared types.
//!
//! Configuration sections consumed by the balancing controller. Loaded once
//! before the loop starts and immutable afterwards.

pub mod config;
