//! Session-level errors.
//!
//! Everything here ends the session. In-loop degradations that can be
//! handled locally never surface as a `SessionError`; they show up as
//! telemetry flags or as a [`StopReason`] in the session outcome.

use rwp_common::config::ConfigError;
use rwp_common::hal::driver::HalError;
use thiserror::Error;

use crate::safety::supervisor::StopReason;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration rejected before the loop started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A collaborator failed during the startup sequence.
    #[error("startup failed at {stage}: {source}")]
    Startup {
        stage: &'static str,
        #[source]
        source: HalError,
    },

    /// The rest sample could not be read.
    #[error("calibration failed: {0}")]
    Calibration(#[source] HalError),

    /// `run_session` called before `calibrate`.
    #[error("session started without calibration")]
    NotCalibrated,

    /// Memory locking, CPU pinning or scheduler setup failed.
    #[error("RT setup failed: {0}")]
    RtSetup(String),

    /// The emergency stop itself failed; the drive state is unknown.
    #[error("emergency stop after {reason} failed: {source}")]
    EstopFailed {
        reason: StopReason,
        #[source]
        source: HalError,
    },
}
