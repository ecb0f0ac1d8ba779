//! Structured telemetry, decoupled from the control math.
//!
//! The cycle runner hands every tick's [`TelemetrySnapshot`] to a
//! [`TelemetrySink`]. [`TracingTelemetry`] decimates to one event every
//! `interval_cycles`; [`RecordingTelemetry`] keeps everything for tests.

use bitflags::bitflags;
use static_assertions::assert_eq_size;
use tracing::{debug, info, warn};

bitflags! {
    /// Degraded-operation conditions active during a tick.
    ///
    /// None of these stop the session on their own.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DegradedFlags: u8 {
        /// Sensor read failed or was late; last sample reused.
        const SENSOR_HELD            = 0x01;
        /// Wheel velocity feedback unavailable; treated as 0.
        const WHEEL_RATE_UNAVAILABLE = 0x02;
        /// Law output exceeded the torque limit and was saturated.
        const TORQUE_CLAMPED         = 0x04;
        /// A sensor read or drive write exceeded the I/O budget.
        const IO_OVER_BUDGET         = 0x08;
    }
}

assert_eq_size!(DegradedFlags, u8);

/// One tick of controller state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySnapshot {
    pub cycle: u64,
    /// Seconds since the loop started.
    pub elapsed_s: f64,
    pub dt: f64,
    pub theta: f64,
    pub theta_dot: f64,
    /// Wheel velocity [rad/s].
    pub wheel_rate: f64,
    /// Law output before saturation [Nm].
    pub torque_nm: f64,
    /// Value sent to the drive, in drive units.
    pub command: f64,
    pub degraded: DegradedFlags,
}

pub trait TelemetrySink {
    fn record(&mut self, snapshot: &TelemetrySnapshot);
}

/// Emits a structured `tracing` event every `interval` cycles.
#[derive(Debug, Clone)]
pub struct TracingTelemetry {
    interval: u64,
}

impl TracingTelemetry {
    pub fn new(interval_cycles: u32) -> Self {
        Self {
            interval: interval_cycles.max(1) as u64,
        }
    }
}

impl TelemetrySink for TracingTelemetry {
    fn record(&mut self, s: &TelemetrySnapshot) {
        if s.cycle % self.interval != 0 {
            return;
        }
        info!(
            target: "rwp::telemetry",
            cycle = s.cycle,
            t = s.elapsed_s,
            theta = s.theta,
            theta_dot = s.theta_dot,
            wheel_rate = s.wheel_rate,
            torque_nm = s.torque_nm,
            command = s.command,
            degraded = s.degraded.bits(),
            "state"
        );
    }
}

/// Keeps every snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    pub snapshots: Vec<TelemetrySnapshot>,
}

impl TelemetrySink for RecordingTelemetry {
    fn record(&mut self, snapshot: &TelemetrySnapshot) {
        self.snapshots.push(*snapshot);
    }
}

/// Logs degraded conditions on entry (warn) and exit (info).
///
/// Steady-state degraded ticks only log at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegradationLog {
    active: DegradedFlags,
}

impl DegradationLog {
    pub fn update(&mut self, cycle: u64, flags: DegradedFlags) {
        let entered = flags.difference(self.active);
        let cleared = self.active.difference(flags);
        if !entered.is_empty() {
            warn!(cycle, flags = ?entered, "degraded operation");
        }
        if !cleared.is_empty() {
            info!(cycle, flags = ?cleared, "degradation cleared");
        }
        if entered.is_empty() && !flags.is_empty() {
            debug!(cycle, flags = ?flags, "still degraded");
        }
        self.active = flags;
    }

    pub const fn active(&self) -> DegradedFlags {
        self.active
    }
}
