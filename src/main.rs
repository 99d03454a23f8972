//! graceful-shutdown demo process.
//!
//! Hosts the configured listeners (by default "business" on :8080 and "admin"
//! on :8081), each answering `/` with a greeting, and registers a cache-flush
//! cleanup callback. Run it from a terminal rather than an IDE so termination
//! signals reach the process.
//!
//! # Exit Codes
//! - 0: graceful shutdown completed within the budget
//! - 1: total shutdown timeout exceeded
//! - 2: force quit (second signal) during shutdown
//! - 3: shutdown sequence panicked

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::time::sleep;

use graceful_shutdown::config::{load_or_default, ListenerConfig};
use graceful_shutdown::lifecycle::{
    CallbackContext, Coordinator, ShutdownCallback, ShutdownOptions, SignalSource,
};
use graceful_shutdown::observability::{logging, metrics};
use graceful_shutdown::{HttpListener, Listener};

#[derive(Parser)]
#[command(name = "graceful-shutdown")]
#[command(about = "Serve several listeners and shut them down gracefully", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    logging::init_logging(level)?;

    tracing::info!("graceful-shutdown v{} starting", env!("CARGO_PKG_VERSION"));

    let options = ShutdownOptions::from(&config.shutdown);
    tracing::info!(
        shutdown_timeout_ms = options.shutdown_timeout.as_millis() as u64,
        wait_time_ms = options.wait_time.as_millis() as u64,
        callback_timeout_ms = options.callback_timeout.as_millis() as u64,
        listeners = config.listeners.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listeners: Vec<Arc<dyn Listener>> = config
        .listeners
        .iter()
        .map(|listener| Arc::new(greeting_listener(listener)) as Arc<dyn Listener>)
        .collect();

    let coordinator = Coordinator::new(listeners, options)?
        .with_callback(ShutdownCallback::new("flush-cache", flush_cache))
        .on_release(|| async {
            tracing::debug!("Process resources released");
        });

    let signals = SignalSource::new()?;
    let status = coordinator.run(signals).await;

    tracing::info!(code = status.code(), outcome = status.as_str(), "Exiting");
    std::process::exit(status.code());
}

fn greeting_listener(config: &ListenerConfig) -> HttpListener {
    let greeting = format!("hello, {}", config.name);
    HttpListener::new(config.name.clone(), config.bind_address.clone())
        .handle("/", move || async move { greeting })
}

/// Simulates flushing a local cache to a database, stage by stage.
async fn flush_cache(ctx: CallbackContext) {
    let stages = [
        ("Flushing local cache", 100),
        ("Recording run log", 200),
        ("Encrypting new data", 400),
        ("Writing new data to database", 500),
        ("Evicting flushed cache", 1000),
    ];
    let work = async {
        for (stage, millis) in stages {
            tracing::info!(stage, "Cache flush in progress");
            sleep(Duration::from_millis(millis)).await;
        }
    };

    tokio::select! {
        _ = work => tracing::info!("Cache flushed to database"),
        _ = ctx.cancelled() => tracing::warn!("Cache flush timed out"),
    }
}
