//! Fixed-period control loop: read → estimate → law → supervise → write.
//!
//! ## Startup
//! 1. `clear_errors`, short pause, `init_bus`.
//! 2. Best-effort position readout.
//! 3. Drive into torque control.
//! 4. Settle delay, then the rest sample fixes the upright reference.
//!
//! ## Session
//! The control loop and the drive's background link future share one
//! cooperative task via `tokio::select!`. The loop yields at every period
//! boundary on a `tokio::time::interval`; late ticks are delayed, never
//! burst. Either future ending ends the session, as does cancellation.
//!
//! ## RT Setup
//! With the `rt` feature, `rt_setup` locks memory, pins the thread and
//! switches to `SCHED_FIFO`. Without it every call is a no-op.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use rwp_common::config::ConfigError;
use rwp_common::consts::{BUS_INIT_PAUSE_MS, MIN_DT_S};
use rwp_common::control_unit::config::ControllerConfig;
use rwp_common::hal::driver::{AngleSensor, HalError, MotorDriver};
use rwp_common::hal::types::ControllerMode;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::balance::BalanceController;
use crate::config::LoadedConfig;
use crate::error::SessionError;
use crate::safety::supervisor::{
    SafetySupervisor, SensorFaultAction, StopReason, SupervisorVerdict,
};
use crate::sensor::{RawSample, decode};
use crate::telemetry::{
    DegradationLog, DegradedFlags, TelemetrySink, TelemetrySnapshot, TracingTelemetry,
};
use crate::units::UnitConverter;
use crate::unwrap::Calibration;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Ticks executed.
    pub cycle_count: u64,
    /// Last tick body duration [ns].
    pub last_body_ns: u64,
    pub min_body_ns: u64,
    pub max_body_ns: u64,
    sum_body_ns: u128,
    /// Ticks whose body exceeded the control period.
    pub overruns: u64,
    /// Largest delay between a scheduled tick and its actual wake-up [ns].
    pub max_latency_ns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_body_ns: 0,
            min_body_ns: u64::MAX,
            max_body_ns: 0,
            sum_body_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record one tick. Returns `true` when the body overran `period`.
    #[inline]
    pub fn record(&mut self, body: Duration, latency: Duration, period: Duration) -> bool {
        let body_ns = body.as_nanos().min(u64::MAX as u128) as u64;
        let latency_ns = latency.as_nanos().min(u64::MAX as u128) as u64;
        self.cycle_count += 1;
        self.last_body_ns = body_ns;
        self.min_body_ns = self.min_body_ns.min(body_ns);
        self.max_body_ns = self.max_body_ns.max(body_ns);
        self.sum_body_ns += body_ns as u128;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
        let overrun = body > period;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    /// Average body time [ns] (0 if no ticks).
    #[inline]
    pub fn avg_body_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            (self.sum_body_ns / self.cycle_count as u128) as u64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Session Outcome ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionOutcome {
    /// Ran until the configured deadline.
    Completed,
    /// Fall, non-finite command or operator cancellation.
    SafetyStop(StopReason),
    /// A collaborator failed beyond local recovery.
    Fault(StopReason),
}

impl SessionOutcome {
    pub fn from_stop(reason: StopReason) -> Self {
        if reason.is_collaborator_fault() {
            Self::Fault(reason)
        } else {
            Self::SafetyStop(reason)
        }
    }

    /// Process exit status: 0 completed, 2 safety stop, 3 collaborator fault.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::SafetyStop(_) => 2,
            Self::Fault(_) => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub stats: CycleStats,
    pub estop_count: u32,
}

enum LoopExit {
    Cancelled,
    LinkEnded(Result<(), HalError>),
    Finished(Result<SessionOutcome, SessionError>),
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), SessionError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| SessionError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), SessionError> {
    Ok(())
}

/// Touch stack pages up front so the loop never faults them in.
#[cfg(feature = "rt")]
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(not(feature = "rt"))]
fn prefault_stack() {}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), SessionError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| SessionError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| SessionError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), SessionError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), SessionError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: pid 0 targets the calling thread; `param` outlives the call.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SessionError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), SessionError> {
    Ok(())
}

/// Lock memory, prefault the stack, pin to `cpu_core`, switch to SCHED_FIFO.
///
/// Call from the thread that will drive the control loop.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), SessionError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the collaborators and all per-session state.
///
/// Lifecycle: [`start`](Self::start) → [`calibrate`](Self::calibrate) →
/// [`run_session`](Self::run_session).
pub struct CycleRunner<S, M, T = TracingTelemetry> {
    config: ControllerConfig,
    units: UnitConverter,
    sensor: S,
    motor: M,
    telemetry: T,
    supervisor: SafetySupervisor,
    controller: Option<BalanceController>,
    last_sample: RawSample,
    stats: CycleStats,
    degradation: DegradationLog,
}

impl<S, M> CycleRunner<S, M, TracingTelemetry>
where
    S: AngleSensor,
    M: MotorDriver,
{
    /// Runner with telemetry routed to `tracing`.
    pub fn new(loaded: LoadedConfig, sensor: S, motor: M) -> Self {
        let telemetry = TracingTelemetry::new(loaded.config.telemetry.interval_cycles);
        Self::with_telemetry(loaded, sensor, motor, telemetry)
    }
}

impl<S, M, T> CycleRunner<S, M, T>
where
    S: AngleSensor,
    M: MotorDriver,
    T: TelemetrySink,
{
    pub fn with_telemetry(loaded: LoadedConfig, sensor: S, motor: M, telemetry: T) -> Self {
        let LoadedConfig { config, units } = loaded;
        let supervisor =
            SafetySupervisor::new(config.limits.fallback_angle, config.sensor.fault_hold_ticks);
        Self {
            config,
            units,
            sensor,
            motor,
            telemetry,
            supervisor,
            controller: None,
            last_sample: RawSample::default(),
            stats: CycleStats::new(),
            degradation: DegradationLog::default(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn supervisor(&self) -> &SafetySupervisor {
        &self.supervisor
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Bring the drive up and switch it to torque control.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.motor
            .clear_errors()
            .map_err(|source| SessionError::Startup {
                stage: "clear_errors",
                source,
            })?;
        time::sleep(Duration::from_millis(BUS_INIT_PAUSE_MS)).await;
        self.motor.init_bus().map_err(|source| SessionError::Startup {
            stage: "init_bus",
            source,
        })?;

        match self.motor.position() {
            Ok(turns) => info!(position_turns = turns, "drive position"),
            Err(e) => warn!(error = %e, "drive position unavailable"),
        }

        self.motor
            .set_controller_mode(ControllerMode::TorqueControl)
            .map_err(|source| SessionError::Startup {
                stage: "set_controller_mode",
                source,
            })?;
        info!("drive in torque control");
        Ok(())
    }

    /// Wait out the settle delay, then capture the upright reference.
    ///
    /// Builds fresh unwrap, estimator and law state plus a new `Armed`
    /// supervisor.
    pub async fn calibrate(&mut self) -> Result<Calibration, SessionError> {
        let timing = self.config.timing;
        info!(
            settle_ms = timing.settle_delay_ms,
            "hold the pendulum upright for calibration"
        );
        time::sleep(timing.settle_delay()).await;

        let addr = self.config.sensor.address();
        let bytes = self
            .sensor
            .read_angle_bytes(&addr)
            .map_err(SessionError::Calibration)?;
        let rest = decode(bytes, self.config.sensor.bit_layout);

        let controller = BalanceController::new(&self.config, self.units, rest)?;
        let calibration = controller.calibration();
        info!(
            rest_turns = calibration.rest_turns,
            gear_ratio = calibration.gear_ratio,
            law = controller.law_name(),
            estimator = controller.estimator_name(),
            "calibrated"
        );

        self.controller = Some(controller);
        self.supervisor = SafetySupervisor::new(
            self.config.limits.fallback_angle,
            self.config.sensor.fault_hold_ticks,
        );
        self.last_sample = rest;
        self.stats = CycleStats::new();
        self.degradation = DegradationLog::default();
        Ok(calibration)
    }

    /// A calibrated controller is waiting for [`run_session`](Self::run_session).
    pub fn is_calibrated(&self) -> bool {
        self.controller.is_some()
    }

    /// Trip the supervisor and estop the drive (once).
    pub fn emergency_stop(&mut self, reason: StopReason) -> Result<StopReason, SessionError> {
        self.supervisor
            .trip(reason, &mut self.motor)
            .map_err(|source| SessionError::EstopFailed { reason, source })
    }

    /// Run the control loop alongside the drive's `background` future until
    /// the deadline, a stop, or `cancel` resolves.
    pub async fn run_session<B, C>(
        &mut self,
        background: B,
        cancel: C,
    ) -> Result<SessionReport, SessionError>
    where
        B: Future<Output = Result<(), HalError>>,
        C: Future<Output = ()>,
    {
        if self.controller.is_none() {
            return Err(SessionError::NotCalibrated);
        }

        let exit = {
            let control = self.control_loop();
            tokio::pin!(control);
            tokio::pin!(background);
            tokio::pin!(cancel);
            tokio::select! {
                biased;
                () = &mut cancel => LoopExit::Cancelled,
                res = &mut background => LoopExit::LinkEnded(res),
                res = &mut control => LoopExit::Finished(res),
            }
        };

        let ended = match exit {
            LoopExit::Cancelled => {
                info!("cancellation requested");
                self.stop_with(StopReason::Cancelled)
            }
            LoopExit::LinkEnded(res) => {
                match res {
                    Ok(()) => error!("drive link task ended unexpectedly"),
                    Err(e) => error!(error = %e, "drive link failed"),
                }
                self.stop_with(StopReason::LinkLost)
            }
            LoopExit::Finished(res) => res,
        };

        // Calibration is consumed by the session however it ended.
        self.controller = None;
        let outcome = ended?;
        info!(
            ?outcome,
            cycles = self.stats.cycle_count,
            avg_body_ns = self.stats.avg_body_ns(),
            max_body_ns = self.stats.max_body_ns,
            overruns = self.stats.overruns,
            "session ended"
        );
        Ok(SessionReport {
            outcome,
            stats: self.stats.clone(),
            estop_count: self.supervisor.estop_count(),
        })
    }

    fn stop_with(&mut self, reason: StopReason) -> Result<SessionOutcome, SessionError> {
        let first = self.emergency_stop(reason)?;
        Ok(SessionOutcome::from_stop(first))
    }

    async fn control_loop(&mut self) -> Result<SessionOutcome, SessionError> {
        let period = self.config.timing.control_period();
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let start = Instant::now();
        let run_seconds = self.config.timing.run_seconds;
        let deadline = self
            .config
            .timing
            .run_duration()
            .and_then(|run| start.checked_add(run))
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "timing.run_seconds {run_seconds} overflows the session deadline"
                ))
            })?;
        let mut last = start;
        let mut cycle: u64 = 0;
        info!(
            period_us = self.config.timing.control_period_us,
            run_seconds = self.config.timing.run_seconds,
            "control loop started"
        );

        loop {
            let scheduled = interval.tick().await;
            let now = Instant::now();
            if now >= deadline {
                self.finish();
                return Ok(SessionOutcome::Completed);
            }

            let dt = (now - last).as_secs_f64().max(MIN_DT_S);
            last = now;

            let flow = self.tick(cycle, (now - start).as_secs_f64(), dt)?;

            let body = now.elapsed();
            if self
                .stats
                .record(body, now.saturating_duration_since(scheduled), period)
                && self.stats.overruns.is_power_of_two()
            {
                warn!(
                    cycle,
                    body_us = body.as_micros() as u64,
                    overruns = self.stats.overruns,
                    "cycle overrun"
                );
            }

            if let ControlFlow::Break(reason) = flow {
                return Ok(SessionOutcome::from_stop(reason));
            }
            cycle += 1;
        }
    }

    /// One pipeline pass. `Break` means the supervisor stopped the session
    /// and the drive has already been estopped.
    fn tick(
        &mut self,
        cycle: u64,
        elapsed_s: f64,
        dt: f64,
    ) -> Result<ControlFlow<StopReason>, SessionError> {
        let budget = self.config.timing.io_budget();
        let mut degraded = DegradedFlags::empty();

        // ── Sensor ──────────────────────────────────────────
        let addr = self.config.sensor.address();
        let t_read = Instant::now();
        let read = self.sensor.read_angle_bytes(&addr);
        let late = t_read.elapsed() > budget;
        let sample = match read {
            Ok(bytes) if !late => {
                self.supervisor.sensor_ok();
                let sample = decode(bytes, self.config.sensor.bit_layout);
                self.last_sample = sample;
                sample
            }
            other => {
                if late {
                    degraded |= DegradedFlags::IO_OVER_BUDGET;
                }
                if let Err(e) = other {
                    debug!(cycle, error = %e, "sensor read failed");
                }
                match self.supervisor.sensor_fault() {
                    SensorFaultAction::HoldLast => {
                        degraded |= DegradedFlags::SENSOR_HELD;
                        self.last_sample
                    }
                    SensorFaultAction::Escalate => return self.halt(StopReason::SensorFault),
                }
            }
        };

        // ── Wheel feedback ──────────────────────────────────
        let wheel_rate = match self.motor.velocity() {
            Ok(raw) => self.units.from_velocity_units(raw),
            Err(e) => {
                debug!(cycle, error = %e, "wheel velocity unavailable");
                degraded |= DegradedFlags::WHEEL_RATE_UNAVAILABLE;
                0.0
            }
        };

        // ── Estimate + law ──────────────────────────────────
        let Some(controller) = self.controller.as_mut() else {
            return Err(SessionError::NotCalibrated);
        };
        let out = controller.step(sample, wheel_rate, dt);

        // ── Supervise ───────────────────────────────────────
        if !out.torque_nm.is_finite() || !out.command.magnitude.is_finite() {
            return self.halt(StopReason::NonFiniteCommand);
        }
        if let SupervisorVerdict::EmergencyStop(reason) = self.supervisor.evaluate(out.state.theta)
        {
            return self.halt(reason);
        }
        if out.command.clamped {
            degraded |= DegradedFlags::TORQUE_CLAMPED;
        }

        // ── Actuate ─────────────────────────────────────────
        let t_write = Instant::now();
        if let Err(e) = self.motor.set_torque(out.command.magnitude) {
            error!(cycle, error = %e, "torque command rejected");
            return self.halt(StopReason::ActuatorFault);
        }
        if t_write.elapsed() > budget {
            degraded |= DegradedFlags::IO_OVER_BUDGET;
        }

        self.degradation.update(cycle, degraded);
        self.telemetry.record(&TelemetrySnapshot {
            cycle,
            elapsed_s,
            dt,
            theta: out.state.theta,
            theta_dot: out.state.theta_dot,
            wheel_rate,
            torque_nm: out.torque_nm,
            command: out.command.magnitude,
            degraded,
        });
        Ok(ControlFlow::Continue(()))
    }

    fn halt(&mut self, reason: StopReason) -> Result<ControlFlow<StopReason>, SessionError> {
        let first = self.emergency_stop(reason)?;
        Ok(ControlFlow::Break(first))
    }

    /// Normal end of session: release the wheel.
    fn finish(&mut self) {
        if let Err(e) = self.motor.set_torque(0.0) {
            warn!(error = %e, "could not zero torque at session end");
        }
    }
}
