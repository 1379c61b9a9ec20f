//! Rollcall - RFID attendance bridge
//!
//! Listens for tag scans on an MQTT topic, answers each one with the
//! student's details (or `UNKNOWN`), keeps local CSV attendance logs and
//! forwards every recorded scan to a web endpoint when the station is online.
//!
//! # Usage
//!
//! ```bash
//! # Run against the broker named in rollcall.toml
//! ./rollcall
//!
//! # Bench test without a broker, one UID per line
//! printf 'A1\nZZZZ\n' | ./rollcall --stdin
//!
//! # Show roster size, queue depth and today's attendance
//! ./rollcall check
//! ```
//!
//! # Environment Variables
//!
//! - `ROLLCALL_CONFIG`: Path to the config file (default: ./rollcall.toml)
//! - `ROLLCALL_DATA_DIR`: Directory holding the CSV files
//! - `ROLLCALL_LOG_FORMAT`: `pretty` or `json`
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use rollcall::bus::{MqttBus, ScanBus, StdinBus};
use rollcall::config::RollcallConfig;
use rollcall::outbox::{HttpCourier, SyncEngine};
use rollcall::pipeline::{EventDispatcher, ProcessingLoop};
use rollcall::storage::ProcessLock;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(about = "RFID attendance bridge: MQTT scans to CSV logs and a web endpoint")]
#[command(version)]
struct CliArgs {
    /// Config file to load. Errors in a file named here are fatal.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the roster, logs and pending queue
    #[arg(long, value_name = "DIR", env = "ROLLCALL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Override the broker address from the config file
    /// Example: ./rollcall --broker 192.168.1.20:1883
    #[arg(long, value_name = "HOST:PORT")]
    broker: Option<String>,

    /// Read UIDs from stdin (one per line) instead of connecting to a broker
    #[arg(long)]
    stdin: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "ROLLCALL_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Validate configuration and print station status without connecting
    Check,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

// ============================================================================
// Startup Helpers
// ============================================================================

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

/// Split `HOST:PORT`, accepting bracketed IPv6 hosts.
fn parse_broker_addr(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .context("Invalid broker address format. Expected HOST:PORT")?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        anyhow::bail!("Invalid broker address: empty host");
    }
    let port: u16 = port.parse().context("Invalid port number")?;
    Ok((host.to_string(), port))
}

fn load_config(args: &CliArgs) -> Result<RollcallConfig> {
    let mut config = match &args.config {
        Some(path) => RollcallConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RollcallConfig::load(),
    };

    if let Some(dir) = &args.data_dir {
        config.storage.data_dir.clone_from(dir);
    }
    if let Some(addr) = &args.broker {
        let (host, port) = parse_broker_addr(addr)?;
        config.broker.host = host;
        config.broker.port = port;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run_check(config: &RollcallConfig) -> Result<()> {
    let dispatcher = EventDispatcher::from_config(&config.storage, &config.scan)?;
    let today = Local::now().date_naive();

    println!();
    println!("  Rollcall station status");
    println!();
    println!("  Data directory:   {}", config.storage.data_dir.display());
    println!("  Broker:           {}:{}", config.broker.host, config.broker.port);
    println!("  Endpoint:         {}", config.delivery.endpoint_url);
    println!();
    println!("  Roster entries:   {}", dispatcher.roster().len());
    println!("  Pending uploads:  {}", dispatcher.queue().pending_count()?);
    println!("  Scans today:      {}", dispatcher.attendance().count_for(today));
    println!();

    Ok(())
}

async fn run_bridge<B: ScanBus>(
    bus: B,
    config: &RollcallConfig,
    dispatcher: EventDispatcher,
    cancel_token: CancellationToken,
) -> Result<()> {
    let courier = HttpCourier::new(&config.delivery).context("Failed to build HTTP client")?;
    let sync = SyncEngine::new(dispatcher.queue().clone(), courier);

    ProcessingLoop::new(bus, dispatcher, sync, config.delivery.sync_interval(), cancel_token)
        .run()
        .await?;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_format);

    let config = load_config(&args)?;

    if let Some(SubCommand::Check) = &args.command {
        return run_check(&config);
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  ROLLCALL - RFID Attendance Bridge");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("📁 Data: {}", config.storage.data_dir.display());
    info!("🌐 Endpoint: {}", config.delivery.endpoint_url);
    info!("");

    let _lock = ProcessLock::acquire(&config.storage.data_dir)?;
    let dispatcher = EventDispatcher::from_config(&config.storage, &config.scan)
        .context("Failed to open pending queue")?;
    info!("📋 Roster: {} entries", dispatcher.roster().len());

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if args.stdin {
        info!("📥 Input: stdin (one UID per line)");
        run_bridge(StdinBus::new(), &config, dispatcher, cancel_token).await?;
    } else {
        info!(
            "📥 Input: MQTT {}:{} topic {}",
            config.broker.host, config.broker.port, config.broker.scan_topic
        );
        let bus = MqttBus::connect(&config.broker)
            .await
            .context("Failed to connect to MQTT broker")?;
        run_bridge(bus, &config, dispatcher, cancel_token).await?;
    }

    info!("");
    info!("✓ Rollcall shutdown complete");
    Ok(())
}
