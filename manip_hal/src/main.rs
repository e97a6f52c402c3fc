//! # Manipulator HAL Binary
//!
//! Runs the hardware cycle of a 7-joint manipulator at a fixed period and,
//! if configured, republishes the external TCP wrench.
//!
//! # Usage
//!
//! ```bash
//! # Simulated arm, hold position
//! manip_hal --config config/hal.toml --mode position
//!
//! # Fixed number of ticks, wrench messages as JSON lines on stdout
//! manip_hal --config config/hal.toml --cycles 5000 --sink json
//!
//! # Verbose JSON logs (stderr)
//! manip_hal --config config/hal.toml -v --json
//! ```

#![deny(warnings)]

use clap::{Parser, ValueEnum};
use manip_common::config::{ConfigLoader, LogLevel};
use manip_common::consts::DEFAULT_CONFIG_PATH;
use manip_common::hal::config::AppConfig;
use manip_common::hal::types::{ControlMode, InterfaceKind, StateSnapshot};
use manip_hal::broadcaster::{JsonLinesSink, LogSink, MessageSink};
use manip_hal::buffers::JointCommandBuffer;
use manip_hal::{
    ControlLoop, CycleOptions, ExternalTcpWrenchBroadcaster, HardwareCycle, LinkRegistry,
    ModeSwitchRequest, WrenchStamped, rt,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Control mode claimed right after activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StartMode {
    /// Stay idle; nothing is written.
    None,
    /// Hold the measured joint positions.
    Position,
    /// Zero joint velocities.
    Velocity,
    /// Pass-through of the measured joint torques.
    Effort,
}

impl StartMode {
    fn interface_kind(self) -> Option<InterfaceKind> {
        match self {
            StartMode::None => None,
            StartMode::Position => Some(InterfaceKind::Position),
            StartMode::Velocity => Some(InterfaceKind::Velocity),
            StartMode::Effort => Some(InterfaceKind::Effort),
        }
    }
}

/// Where wrench messages go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// `tracing` debug events.
    Log,
    /// One JSON object per line on stdout.
    Json,
}

/// Manipulator HAL - real-time hardware cycle with control-mode arbitration
#[derive(Parser, Debug)]
#[command(name = "manip_hal")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Real-time HAL for a 7-joint manipulator")]
#[command(long_about = None)]
struct Args {
    /// Path to the HAL configuration file (hal.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Robot link to load (overrides `hardware.link`)
    #[arg(short, long)]
    link: Option<String>,

    /// Stop after this many ticks (default: run until Ctrl-C)
    #[arg(long)]
    cycles: Option<u64>,

    /// Control mode to claim after activation
    #[arg(short, long, value_enum, default_value_t = StartMode::None)]
    mode: StartMode,

    /// Wrench message sink
    #[arg(long, value_enum, default_value_t = SinkKind::Log)]
    sink: SinkKind,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("HAL startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = AppConfig::load(&args.config);
    setup_tracing(
        &args,
        loaded.as_ref().map(|c| c.shared.log_level).unwrap_or_default(),
    );
    let mut config = loaded.map_err(|e| format!("{}: {e}", args.config.display()))?;
    if let Some(link) = &args.link {
        config.hardware.link = link.clone();
    }
    config.validate()?;

    info!(
        "Manipulator HAL v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let registry = LinkRegistry::with_builtin_links();
    info!("Available links: {:?}", registry.list_links());
    let hw = &config.hardware;
    let link = registry.create(&hw.link, &hw.link_config_for(&hw.link))?;

    let mut cycle = HardwareCycle::new(link);
    cycle.configure(&hw.joints, CycleOptions::from(hw))?;

    // Fallible setup runs while only configured; the cycle is dropped
    // without commanding the robot if any of it fails.
    let broadcaster = match &config.broadcaster {
        Some(bc_config) => {
            let sink: Box<dyn MessageSink<WrenchStamped>> = match args.sink {
                SinkKind::Log => Box::new(LogSink::new(bc_config.topic_name.clone())),
                SinkKind::Json => Box::new(JsonLinesSink::stdout()),
            };
            let mut broadcaster = ExternalTcpWrenchBroadcaster::new();
            broadcaster.configure(bc_config, sink)?;
            broadcaster.activate(cycle.interfaces()?)?;
            Some(broadcaster)
        }
        None => None,
    };

    // After the publisher thread exists, so it keeps the default policy.
    rt::apply(hw)?;

    let stop = cycle.stop_handle();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        stop.request_stop();
    })?;

    cycle.activate()?;
    info!("Driving the '{}' link", cycle.link_name());

    // Commits seed the new mode's commands from the activation snapshot.
    if let Some(kind) = args.mode.interface_kind() {
        let request = ModeSwitchRequest::start(cycle.interfaces()?, kind);
        cycle.switch_mode(&request)?;
    }

    let mut control = ControlLoop::new(cycle, broadcaster, hw);
    // Commands keep their commit-time values: measured positions in position
    // mode; measured velocities or torques (zeros under the zero policy)
    // in the other modes.
    let mut hold = |_: &StateSnapshot, _: ControlMode, _: &mut JointCommandBuffer| {};
    let result = control.run(&mut hold, args.cycles);
    if let Err(e) = &result {
        error!("Control loop error: {}", e);
    }

    if let Err(e) = control.cycle_mut().stop() {
        error!("Final stop failed: {}", e);
    }
    if let Some(broadcaster) = control.broadcaster() {
        let stats = broadcaster.stats();
        info!(
            "Wrench broadcaster: {} published, {} skipped, {} overwritten",
            stats.published, stats.skipped, stats.overwritten
        );
    }

    result?;
    info!("Manipulator HAL shutdown complete");
    Ok(())
}

/// Setup tracing subscriber; logs go to stderr so stdout stays free for sinks.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        configured.as_tracing_level()
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
