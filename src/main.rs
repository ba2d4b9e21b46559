//! Heart-rate sensor relay entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pulse_relay::api::{create_router, AppState};
use pulse_relay::config::{Config, LogConfig};
use pulse_relay::metrics;
use pulse_relay::store::{self, ReadingStore, StorePtr};
use pulse_relay::utils::shutdown_signal;

/// Heart-rate sensor ingestion relay.
#[derive(Parser, Debug)]
#[command(name = "pulse-relay")]
#[command(about = "Stores heart-rate sensor readings and serves the latest one")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP listening port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// HTTP listening port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Print the most recent stored reading as JSON.
    Latest,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let log_config = LogConfig::load().unwrap_or_default();
    let filter = EnvFilter::new(log_config.filter_directive(args.verbose));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::Serve { port }) => cmd_serve(port.or(args.port)).await,
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Latest) => cmd_latest().await,
        None => cmd_serve(args.port).await,
    }
}

/// Load and validate configuration, logging the failure reason.
fn load_config() -> anyhow::Result<Config> {
    Config::load_validated().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e.into()
    })
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("PULSE RELAY - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  API Key: present");
    println!("  Port: {}", config.port);
    println!("  Database: {}", config.database_path);
    println!(
        "  Static Dir: {} ({})",
        config.static_dir.display(),
        if config.static_dir.is_dir() { "found" } else { "missing" }
    );
    println!("  Strict Readings: {}", config.strict_readings);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Print the most recent reading straight from the store.
async fn cmd_latest() -> anyhow::Result<()> {
    let config = load_config()?;
    let store = store::open_configured(&config).await?;

    let latest = store.latest().await;
    store.close().await?;

    match latest? {
        Some(reading) => println!("{}", serde_json::to_string_pretty(&reading)?),
        None => println!("No data available"),
    }

    Ok(())
}

/// Run the HTTP server until a shutdown signal arrives.
async fn cmd_serve(port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.port = port;
    }

    let prometheus = metrics::install_recorder()?;
    let upkeep = metrics::spawn_upkeep(prometheus.clone(), metrics::UPKEEP_INTERVAL);

    let store: StorePtr = Arc::new(store::open_configured(&config).await?);

    let state = AppState::new(Arc::clone(&store), config.api_key.clone())
        .with_strict_readings(config.strict_readings)
        .with_metrics(prometheus);

    let static_dir = config
        .static_dir
        .is_dir()
        .then_some(config.static_dir.as_path());
    if static_dir.is_none() {
        warn!(
            "Static directory {} not found, serving API only",
            config.static_dir.display()
        );
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Server is running on http://{}", addr);
    info!(
        "Reading validation: {}",
        if config.strict_readings { "STRICT" } else { "LENIENT" }
    );

    axum::serve(listener, create_router(state, static_dir))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    upkeep.abort();
    store.close().await?;
    info!("Server stopped");

    Ok(())
}
