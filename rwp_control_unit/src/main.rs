//! # RWP Control Unit
//!
//! Runs one balancing session against the simulated bench described in the
//! `[simulation]` section of the configuration file.
//!
//! `--print-config` shows the configuration after defaults are applied.
//!
//! Exit status: 0 completed, 1 configuration or startup error, 2 safety
//! stop (fall, non-finite command, Ctrl-C), 3 collaborator fault.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use rwp_common::config::{ConfigLoader, LogLevel};
use rwp_common::consts::DEFAULT_CONFIG_PATH;
use rwp_common::control_unit::config::ControllerConfig;
use rwp_control_unit::config::{LoadedConfig, validate};
use rwp_control_unit::cycle::{CycleRunner, SessionOutcome, rt_setup};
use rwp_control_unit::error::SessionError;
use rwp_control_unit::safety::supervisor::StopReason;
use rwp_hal::{DriveScaling, SimulationBench, SimulationFile};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// RWP Control Unit: reaction-wheel pendulum balancing loop
#[derive(Parser, Debug)]
#[command(name = "rwp_control_unit")]
#[command(version)]
#[command(about = "Balances a reaction-wheel inverted pendulum")]
struct Args {
    /// Path to the controller configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override `timing.run_seconds`.
    #[arg(long)]
    run_seconds: Option<f64>,

    /// CPU core to pin the control thread to (`rt` feature only).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (`rt` feature only).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    let loaded = load(&args);
    let level = loaded
        .as_ref()
        .map(|l| l.config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    if args.print_config {
        let code = match &loaded {
            Ok(l) => print_config(l),
            Err(e) => {
                error!("FATAL: {e}");
                1
            }
        };
        process::exit(code);
    }

    info!("RWP Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let code = match loaded.map_err(SessionError::from).and_then(|l| run(&args, l)) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!("FATAL: {e}");
            exit_code(&e)
        }
    };

    info!(code, "RWP Control Unit shutdown complete");
    process::exit(code);
}

fn load(args: &Args) -> Result<LoadedConfig, rwp_common::config::ConfigError> {
    let mut config = ControllerConfig::load(&args.config)?;
    if let Some(secs) = args.run_seconds {
        config.timing.run_seconds = secs;
    }
    validate(config)
}

fn run(args: &Args, loaded: LoadedConfig) -> Result<SessionOutcome, SessionError> {
    let simulation = SimulationFile::load(&args.config)?.simulation;
    simulation.validate()?;
    info!(
        period_us = loaded.config.timing.control_period_us,
        torque_limit = loaded.config.limits.torque_limit,
        fallback_angle = loaded.config.limits.fallback_angle,
        torque_unit = ?loaded.units.torque_unit(),
        velocity_unit = ?loaded.units.velocity_unit(),
        "config OK"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SessionError::RtSetup(format!("runtime: {e}")))?;

    runtime.block_on(session(args, loaded, simulation))
}

async fn session(
    args: &Args,
    loaded: LoadedConfig,
    simulation: rwp_hal::SimulationConfig,
) -> Result<SessionOutcome, SessionError> {
    let scaling = DriveScaling {
        nm_per_unit: loaded.units.from_drive_units(1.0),
        units_per_rad_s: loaded.units.to_velocity_units(1.0),
    };
    let bench = SimulationBench::new(simulation);
    let sensor = bench.encoder(
        loaded.config.sensor.address(),
        loaded.config.sensor.bit_layout,
        loaded.config.drive.gear_ratio,
    );
    let motor = bench.motor(scaling);
    let link = bench.link(scaling);

    let mut runner = CycleRunner::new(loaded, sensor, motor);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let startup = tokio::select! {
        biased;
        () = &mut shutdown => None,
        res = async {
            runner.start().await?;
            runner.calibrate().await
        } => Some(res),
    };
    match startup {
        Some(res) => {
            res?;
        }
        None => {
            info!("cancelled during startup");
            let reason = runner.emergency_stop(StopReason::Cancelled)?;
            return Ok(SessionOutcome::from_stop(reason));
        }
    }

    rt_setup(args.cpu_core, args.rt_priority)?;

    let report = runner.run_session(link.run(), &mut shutdown).await?;
    info!(
        outcome = ?report.outcome,
        estops = report.estop_count,
        heartbeats = bench.heartbeats(),
        "session report"
    );
    Ok(report.outcome)
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}

fn print_config(loaded: &LoadedConfig) -> i32 {
    match toml::to_string_pretty(&loaded.config) {
        Ok(text) => {
            println!("{text}");
            0
        }
        Err(e) => {
            error!("cannot render config: {e}");
            1
        }
    }
}

fn exit_code(err: &SessionError) -> i32 {
    match err {
        SessionError::EstopFailed { .. } => 3,
        _ => 1,
    }
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
///
/// `RUST_LOG` directives take precedence over both.
fn setup_tracing(args: &Args, level: LogLevel) {
    let default = if args.verbose {
        "debug"
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
