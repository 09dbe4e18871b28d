/*!
# Beacon Monitor

Decodes Eddystone BLE advertisements and tracks the beacons behind them.
Scan results come in as newline-delimited JSON records; beacon events go out
as JSON lines on stdout. Logs are written to stderr.

## Record format

```json
{"address": "AA:BB:CC:DD:EE:FF", "rssi": -64, "service_data": {"FEAA": "00e7..."}}
{"address": "AA:BB:CC:DD:EE:FF", "rssi": -64, "adv_data": "0201060303aafe..."}
```

## Usage

### Monitor from stdin, a file or UDP
```bash
scanner | beacon_monitor monitor
beacon_monitor monitor --input adverts.jsonl
beacon_monitor monitor --udp --port 5577
```

### Decode a single frame
```bash
beacon_monitor decode 10eb0367697468756207 --rssi -60
```
*/

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

mod config;
mod ingest;
mod tracker;

use config::AppConfig;
use ingest::{BeaconMonitor, InputSource};

#[derive(Parser)]
#[command(name = "beacon_monitor")]
#[command(about = "Eddystone advertisement decoding and beacon tracking")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "beacon_monitor.toml")]
    config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode advertisements and track beacons
    Monitor {
        /// Read records from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Receive records over UDP
        #[arg(long)]
        udp: bool,

        /// UDP bind address
        #[arg(short, long)]
        bind_addr: Option<String>,

        /// UDP port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Forget beacons after this many milliseconds of silence
        #[arg(long)]
        expiration_ms: Option<u64>,
    },

    /// Decode one Eddystone frame given as hex and print it as JSON
    Decode {
        /// Frame bytes as hex (separators ':', '-' and spaces are ignored)
        hex: String,

        /// Signal strength to attach to UID/EID observations
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        rssi: i16,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "beacon_monitor.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config);
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_logging(&config.logging.level);

    match cli.command {
        Some(Commands::Monitor { input, udp, bind_addr, port, expiration_ms }) => {
            if let Some(input) = input {
                config.monitor.input_path = Some(input.display().to_string());
            }
            if udp {
                config.monitor.udp_enabled = true;
            }
            if let Some(bind_addr) = bind_addr {
                config.monitor.udp_bind_addr = bind_addr;
            }
            if let Some(port) = port {
                config.monitor.udp_port = port;
            }
            if let Some(expiration_ms) = expiration_ms {
                config.monitor.beacon_expiration_ms = expiration_ms;
            }
            run_monitor(config)
        }

        Some(Commands::Decode { hex, rssi }) => decode_frame(&hex, rssi),

        Some(Commands::Config { output }) => generate_config_file(output),

        None => run_monitor(config),
    }
}

/// Load the config file, falling back to defaults when it is missing or invalid
fn load_config(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::new();
    }
    AppConfig::load_from_file(path).unwrap_or_else(|e| {
        eprintln!("⚠️ Failed to load config ({:#}), using defaults", e);
        AppConfig::new()
    })
}

/// Initialize logging to stderr to keep stdout clean for events
fn init_logging(level: &str) {
    let max_level = level.parse::<Level>().unwrap_or_else(|_| {
        eprintln!("⚠️ Unknown log level {:?}, using info", level);
        Level::INFO
    });

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(max_level)
        .init();
}

/// Run the monitor until the input ends or Ctrl+C
fn run_monitor(config: AppConfig) -> Result<()> {
    let source = InputSource::from_config(&config.monitor);
    info!(
        "🚀 Starting beacon monitor v{} (eddystone v{})",
        env!("CARGO_PKG_VERSION"),
        eddystone::VERSION
    );

    let mut monitor = BeaconMonitor::new(source, config.monitor);

    // Set up Ctrl+C handler
    let running = monitor.get_running_flag();
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, shutting down gracefully...");
        running.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    monitor.start().context("Beacon monitor failed")?;

    info!("✅ Beacon monitor stopped");
    Ok(())
}

/// Decode a single hex frame and print it as pretty JSON
fn decode_frame(hex_input: &str, rssi: i16) -> Result<()> {
    let cleaned: String = hex_input
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | ' '))
        .collect();
    let data = hex::decode(&cleaned).with_context(|| format!("Invalid hex input: {}", hex_input))?;

    let frame_type = eddystone::classify(&data);
    let frame = eddystone::decode(&data, rssi)
        .with_context(|| format!("Failed to decode {} frame", frame_type))?;

    if let eddystone::Frame::Uid(beacon) | eddystone::Frame::Eid(beacon) = &frame {
        match beacon.estimated_distance() {
            Some(distance) => info!("📏 Estimated distance: {:.2} m", distance),
            None => warn!("No distance estimate without rssi and tx power"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}

/// Generate a default configuration file
fn generate_config_file(output_path: PathBuf) -> Result<()> {
    let config = AppConfig::new();
    config.save_to_file(&output_path)?;

    println!("✅ Generated configuration file: {}", output_path.display());
    println!("📝 Edit the file to customize settings, then run:");
    println!("   beacon_monitor --config {}", output_path.display());

    Ok(())
}
