//! # Haptic Core Binary
//!
//! Runs the haptic pipeline against the simulation transport and an animated
//! demo host.
//!
//! # Usage
//!
//! ```bash
//! # Run the default body regions until Ctrl-C
//! haptic_core --config config/haptic.toml
//!
//! # Ten seconds of head and torso output with verbose logging
//! haptic_core --positions head,torso --run-secs 10 -v
//!
//! # Devices connect after startup and are provisioned on the fly
//! haptic_core --hotplug --json
//! ```

use clap::Parser;
use haptic_common::config::{ConfigLoader, HapticConfig, LogLevel};
use haptic_common::position::{LogicalPosition, Side};
use haptic_core::drivers::simulation::{DemoPointSource, DemoProvisioner, SimulatedTransport};
use haptic_core::mapper::PositionMapper;
use haptic_core::runtime::{Collaborators, HapticRuntime};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Demo host animation period.
const ANIMATION_INTERVAL: Duration = Duration::from_millis(50);
/// Shutdown flag poll period of the main thread.
const MAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Haptic Core - real-time haptic synthesis and device submission
#[derive(Parser, Debug)]
#[command(name = "haptic_core")]
#[command(version)]
#[command(about = "Real-time haptic signal synthesis and rate-limited device submission")]
#[command(long_about = None)]
struct Args {
    /// Path to configuration file (haptic.toml)
    #[arg(short, long, default_value = "/etc/haptic/haptic.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS")]
    run_secs: Option<u64>,

    /// Demo body regions, comma separated (e.g. head,torso,left_hand)
    #[arg(long, value_delimiter = ',')]
    positions: Vec<LogicalPosition>,

    /// Force hot-plug on: devices connect after startup
    #[arg(long)]
    hotplug: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Haptic core failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Seed the log level from the file before the loader logs anything.
    let file_level = HapticConfig::load(&args.config)
        .map(|config| config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, file_level);

    info!("Haptic Core v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = HapticConfig::load_or_default(&args.config);
    if args.hotplug {
        config.features.enable_hotplug = true;
    }
    let hotplug = config.features.enable_hotplug;

    let positions = if args.positions.is_empty() {
        default_positions()
    } else {
        args.positions.clone()
    };
    info!("Demo positions: {:?}", positions);

    let mapper = PositionMapper;
    let devices: Vec<_> = positions.iter().map(|&p| mapper.to_physical(p)).collect();

    // With hot-plug the host starts empty and devices connect later.
    let (transport, source) = if hotplug {
        (SimulatedTransport::new(), DemoPointSource::new())
    } else {
        (
            SimulatedTransport::with_connected(devices.iter().copied()),
            DemoPointSource::with_positions(&positions),
        )
    };
    let transport = Arc::new(transport);
    let source = Arc::new(source);
    let provisioner = Arc::new(DemoProvisioner::new(Arc::clone(&source)));

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("haptic-rt")
        .build()?;

    let mut haptics = HapticRuntime::new(
        config,
        Collaborators {
            transport: transport.clone(),
            points: source.clone(),
            provisioner,
        },
        tokio_runtime.handle().clone(),
    )?;

    let running = Arc::new(AtomicBool::new(true));
    let signal_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        signal_flag.store(false, Ordering::SeqCst);
    })?;

    haptics.start()?;

    if hotplug {
        for &device in &devices {
            transport.connect(device);
        }
    }

    let animation_flag = Arc::clone(&running);
    let animated = Arc::clone(&source);
    tokio_runtime.spawn(async move {
        let started = Instant::now();
        let mut interval = tokio::time::interval(ANIMATION_INTERVAL);
        while animation_flag.load(Ordering::SeqCst) {
            interval.tick().await;
            animated.animate(started.elapsed().as_secs_f32());
        }
    });

    let deadline = args.run_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
    while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
        std::thread::sleep(MAIN_POLL_INTERVAL);
    }
    running.store(false, Ordering::SeqCst);

    haptics.stop();
    let diagnostics = haptics.diagnostics();
    info!("Final diagnostics: {}", serde_json::to_string(&diagnostics)?);

    drop(haptics);
    tokio_runtime.shutdown_timeout(Duration::from_secs(1));

    info!("Haptic Core shutdown complete");
    Ok(())
}

/// Every body region except the explicit vest halves.
fn default_positions() -> Vec<LogicalPosition> {
    vec![
        LogicalPosition::Head,
        LogicalPosition::Torso,
        LogicalPosition::Arm(Side::Left),
        LogicalPosition::Arm(Side::Right),
        LogicalPosition::Hand(Side::Left),
        LogicalPosition::Hand(Side::Right),
        LogicalPosition::Foot(Side::Left),
        LogicalPosition::Foot(Side::Right),
    ]
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, file_level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        file_level.into()
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
