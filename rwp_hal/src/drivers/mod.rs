//! Collaborator implementations.
//!
//! - [`simulation`] - software bench for development and testing

pub mod simulation;
