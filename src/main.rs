use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use quota_gate::config::{GateConfig, LogFormat, LoggingConfig};
use quota_gate::{CounterStore, InMemoryCounterStore, QuotaGate, QuotaGateError, RedisCounterStore};

/// Fixed-window quota checks against a shared counter store.
#[derive(Debug, Parser)]
#[command(name = "quota-gate", version, about)]
struct Cli {
    /// YAML configuration file; `QUOTA_GATE__*` environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Counter store URL, overriding `store.url`
    #[arg(long, global = true)]
    store_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check and record operations for a key
    Check {
        /// Quota key; defaults to EXAMPLE::TIME, or EXAMPLE::UTC with --utc
        #[arg(short, long)]
        key: Option<String>,

        /// Use UTC instead of local time
        #[arg(long)]
        utc: bool,

        /// Number of operations to attempt
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Pause between operations, in milliseconds
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
    },
    /// Show the current counter for a key without recording anything
    Usage {
        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = GateConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.store_url.clone() {
        config.store.url = Some(url);
    }

    init_tracing(&config.logging);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        limit = config.quota.limit,
        window_seconds = config.quota.window_seconds,
        admission = ?config.quota.admission,
        "Configuration loaded"
    );

    let store: Arc<dyn CounterStore> = match config.store.url.as_deref() {
        Some(url) => Arc::new(RedisCounterStore::connect(url, config.store.timeout()).await?),
        None => {
            warn!("No store.url configured, counters are kept in memory for this process only");
            Arc::new(InMemoryCounterStore::new())
        }
    };
    let gate = QuotaGate::with_config(store, &config.quota);

    match cli.command {
        Command::Check {
            key,
            utc,
            count,
            interval_ms,
        } => {
            let key = key.unwrap_or_else(|| default_key(utc).to_string());
            tokio::select! {
                result = run_checks(&gate, &key, utc, count, Duration::from_millis(interval_ms), cli.json) => result,
                _ = shutdown_signal() => Ok(()),
            }
        }
        Command::Usage { key } => {
            let usage = gate.usage(&key).await.map_err(|e| report(e, cli.json))?;
            if cli.json {
                println!("{}", serde_json::to_string(&usage)?);
            } else {
                println!(
                    "{} {}/{} ({} remaining)",
                    usage.key, usage.current_count, usage.limit, usage.remaining
                );
            }
            Ok(())
        }
    }
}

fn default_key(utc: bool) -> &'static str {
    if utc {
        "EXAMPLE::UTC"
    } else {
        "EXAMPLE::TIME"
    }
}

fn wall_clock(utc: bool) -> NaiveTime {
    if utc {
        Utc::now().time()
    } else {
        Local::now().time()
    }
}

async fn run_checks(
    gate: &QuotaGate,
    key: &str,
    utc: bool,
    count: u32,
    interval: Duration,
    json: bool,
) -> anyhow::Result<()> {
    for i in 0..count {
        if i > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        let decision = gate
            .check_and_record(key, wall_clock(utc))
            .await
            .map_err(|e| report(e, json))?;

        if json {
            println!("{}", serde_json::to_string(&decision)?);
        } else {
            println!("{}", decision);
        }
    }
    Ok(())
}

/// Log a gate error and, in JSON mode, emit it as a distinct error record so
/// it cannot be mistaken for a decision.
fn report(err: QuotaGateError, json: bool) -> anyhow::Error {
    error!(kind = err.kind(), error = %err, "Quota check failed");
    if json {
        println!(
            "{}",
            serde_json::json!({ "error": err.kind(), "detail": err.to_string() })
        );
    }
    anyhow::Error::new(err).context("service error")
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping");
        }
    }
}
