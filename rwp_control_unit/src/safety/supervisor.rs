//! Two-state safety supervisor: `Armed → Stopped` (terminal).
//!
//! The transition fires on a fall (`|θ| > fallback_angle`), on a collaborator
//! fault that cannot be defaulted locally, or on external cancellation. The
//! drive is estopped exactly once, before control returns to the loop.
//! Recovery needs a fresh calibration and a new supervisor.

use std::fmt;

use rwp_common::hal::driver::{HalError, MotorDriver};
use tracing::{error, warn};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    /// |θ| exceeded the fallback angle.
    FallDetected { theta: f64, limit: f64 },
    /// Sensor reads kept failing beyond the hold window.
    SensorFault,
    /// The drive rejected a torque command.
    ActuatorFault,
    /// The drive's background link stopped.
    LinkLost,
    /// Operator interrupt.
    Cancelled,
    /// Estimator or law produced NaN/inf.
    NonFiniteCommand,
}

impl StopReason {
    /// True for stops caused by a collaborator rather than the pendulum or
    /// the operator.
    pub const fn is_collaborator_fault(&self) -> bool {
        matches!(self, Self::SensorFault | Self::ActuatorFault | Self::LinkLost)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FallDetected { theta, limit } => {
                write!(f, "fall detected (|theta| = {:.3} rad > {limit:.3} rad)", theta.abs())
            }
            Self::SensorFault => write!(f, "persistent sensor fault"),
            Self::ActuatorFault => write!(f, "actuator write fault"),
            Self::LinkLost => write!(f, "drive link lost"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::NonFiniteCommand => write!(f, "non-finite torque command"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SupervisorState {
    Armed,
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SupervisorVerdict {
    Continue,
    EmergencyStop(StopReason),
}

/// What the loop should do about a failed sensor read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFaultAction {
    /// Reuse the last good sample this tick.
    HoldLast,
    /// Hold window exhausted; stop.
    Escalate,
}

#[derive(Debug, Clone)]
pub struct SafetySupervisor {
    state: SupervisorState,
    fallback_angle: f64,
    fault_hold_ticks: u32,
    consecutive_sensor_faults: u32,
    estop_count: u32,
}

impl SafetySupervisor {
    pub fn new(fallback_angle: f64, fault_hold_ticks: u32) -> Self {
        Self {
            state: SupervisorState::Armed,
            fallback_angle,
            fault_hold_ticks,
            consecutive_sensor_faults: 0,
            estop_count: 0,
        }
    }

    #[inline]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    #[inline]
    pub const fn is_armed(&self) -> bool {
        matches!(self.state, SupervisorState::Armed)
    }

    /// Number of estop commands this supervisor issued (0 or 1).
    pub const fn estop_count(&self) -> u32 {
        self.estop_count
    }

    /// Check the estimated angle. Does not change state.
    #[inline]
    pub fn evaluate(&self, theta: f64) -> SupervisorVerdict {
        if let SupervisorState::Stopped(reason) = self.state {
            return SupervisorVerdict::EmergencyStop(reason);
        }
        // NaN fails the comparison; treat it as a fall too.
        if !(theta.abs() <= self.fallback_angle) {
            return SupervisorVerdict::EmergencyStop(StopReason::FallDetected {
                theta,
                limit: self.fallback_angle,
            });
        }
        SupervisorVerdict::Continue
    }

    /// Record a failed or late sensor read.
    pub fn sensor_fault(&mut self) -> SensorFaultAction {
        self.consecutive_sensor_faults = self.consecutive_sensor_faults.saturating_add(1);
        if self.consecutive_sensor_faults > self.fault_hold_ticks {
            SensorFaultAction::Escalate
        } else {
            SensorFaultAction::HoldLast
        }
    }

    /// Record a good sensor read.
    #[inline]
    pub fn sensor_ok(&mut self) {
        self.consecutive_sensor_faults = 0;
    }

    /// Enter `Stopped` and estop the drive.
    ///
    /// Idempotent: a second call returns the original reason without another
    /// estop. The state is `Stopped` even when the estop itself fails.
    ///
    /// # Errors
    /// The drive's estop error, unchanged.
    pub fn trip<M: MotorDriver + ?Sized>(
        &mut self,
        reason: StopReason,
        motor: &mut M,
    ) -> Result<StopReason, HalError> {
        if let SupervisorState::Stopped(first) = self.state {
            return Ok(first);
        }
        self.state = SupervisorState::Stopped(reason);
        self.estop_count += 1;
        warn!(%reason, "emergency stop");
        motor.estop().inspect_err(|e| {
            error!(%reason, error = %e, "estop command failed");
        })?;
        Ok(reason)
    }
}
