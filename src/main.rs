//! Deepcool Display Control CLI
//!
//! Command-line interface for running the telemetry display driver and
//! inspecting devices and sensors.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use deepcool_rust_display::config::{DisplayMode, FrameLength};
use deepcool_rust_display::device::{HidApiTransport, HidTransport};
use deepcool_rust_display::protocol::{CANDIDATE_PRODUCT_IDS, DEEPCOOL_VID, Series};
use deepcool_rust_display::sensors::{HardwareProvider, SystemProvider};
use deepcool_rust_display::session::TelemetrySession;
use deepcool_rust_display::storage;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Deepcool Display Control Tool
#[derive(Parser, Debug)]
#[command(name = "deepcool-display-cli")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the telemetry driver until interrupted
    Run {
        /// CPU display mode: c, f, usage, power, anim
        #[arg(short, long)]
        mode: Option<String>,

        /// GPU display mode (defaults to mirroring the CPU mode)
        #[arg(short, long)]
        gpu_mode: Option<String>,

        /// Update interval in milliseconds (200-10000)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stream 11-byte table frames instead of telemetry frames
        #[arg(long)]
        table: bool,

        /// Stream both a telemetry and a table frame each tick
        #[arg(long)]
        dual: bool,

        /// For unclassified devices, emit both series layouts
        #[arg(long)]
        test_both: bool,

        /// Telemetry frame length in bytes: 18 or 64
        #[arg(long)]
        packet_len: Option<usize>,
    },

    /// List connected candidate display devices
    List,

    /// Diagnostic: dump the hardware sensor snapshot
    Sensors,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Run {
            mode,
            gpu_mode,
            interval,
            table,
            dual,
            test_both,
            packet_len,
        } => cmd_run(mode, gpu_mode, interval, table, dual, test_both, packet_len),
        Command::List => cmd_list(),
        Command::Sensors => cmd_sensors(),
    }
}

// =============================================================================
// Commands
// =============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    mode: Option<String>,
    gpu_mode: Option<String>,
    interval: Option<u64>,
    table: bool,
    dual: bool,
    test_both: bool,
    packet_len: Option<usize>,
) -> Result<()> {
    storage::ensure_config_exists().context("Failed to initialize config file")?;
    let app_config = storage::load_config().context("Failed to load config file")?;
    let mut config = app_config.resolve().context("Invalid config file")?;

    // CLI flags override config-file values.
    if let Some(mode) = mode {
        config.cpu_mode = DisplayMode::parse(&mode)?;
    }
    if let Some(mode) = gpu_mode {
        config.gpu_mode = Some(DisplayMode::parse(&mode)?);
    }
    if let Some(ms) = interval {
        config.update_interval_ms = ms;
    }
    if let Some(len) = packet_len {
        config.frame_length = FrameLength::from_bytes(len)?;
    }
    config.table_mode |= table;
    config.dual_mode |= dual;
    config.test_both_mode |= test_both;

    let transport = HidApiTransport::new().context("Failed to initialize HID transport")?;
    let provider = Box::new(SystemProvider::new());

    let Some(session) = TelemetrySession::start(&transport, provider, config) else {
        // Not an error: the process just has nothing to drive.
        println!("No Deepcool display device found.");
        return Ok(());
    };

    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    println!("Telemetry driver running (Ctrl+C to stop)...");
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    session.stop();
    println!("Stopped.");
    Ok(())
}

fn cmd_list() -> Result<()> {
    let transport = HidApiTransport::new().context("Failed to initialize HID transport")?;
    let devices = transport.enumerate(DEEPCOOL_VID);

    if devices.is_empty() {
        println!("No devices found for vendor {:#06x}.", DEEPCOOL_VID);
        return Ok(());
    }

    println!("Connected devices (vendor {:#06x}):", DEEPCOOL_VID);
    for info in devices {
        let series = Series::from_product_id(info.product_id);
        let candidate = CANDIDATE_PRODUCT_IDS.contains(&info.product_id);
        println!(
            "  {:#06x}  series {:<7}  {}",
            info.product_id,
            series.to_string(),
            if candidate { "supported" } else { "not a candidate id" }
        );
    }
    Ok(())
}

fn cmd_sensors() -> Result<()> {
    let provider = SystemProvider::new();

    for unit in provider.units() {
        println!("[{:?}] {}", unit.kind, unit.name);
        for sensor in &unit.sensors {
            match sensor.value {
                Some(v) => println!("    {:<12} {:<24} {:.1}", format!("{:?}", sensor.kind), sensor.name, v),
                None => println!("    {:<12} {:<24} -", format!("{:?}", sensor.kind), sensor.name),
            }
        }
    }
    Ok(())
}
