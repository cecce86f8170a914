//! snoozer-worker: runs the rule scheduler against Railway.
//!
//! Loads configuration from the environment (and `.env`), connects the rule
//! store, and ticks until Ctrl-C. A tick in progress is allowed to finish so
//! no claim is left behind.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use snoozer_core::config::{load_dotenv, Config};
use snoozer_platform::{PlatformClient, RailwayClient};
use snoozer_rules::dispatcher::ActionDispatcher;
use snoozer_rules::scheduler::{RuleScheduler, SchedulerConfig};
use snoozer_rules::store::{InMemoryRuleStore, PgRuleStore, RuleStore};

// ── CLI ─────────────────────────────────────────────────────────────

/// Scheduled action worker that executes due STOP/DELETE rules.
#[derive(Parser, Debug)]
#[command(name = "snoozer-worker", version, about)]
struct Cli {
    /// Keep rules in process memory instead of PostgreSQL (for local runs).
    #[arg(long)]
    in_memory: bool,

    /// Override the scheduler tick interval in seconds.
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Default Railway environment for rules that do not name one.
    #[arg(long)]
    environment_id: Option<String>,

    /// Seconds to wait for the current tick on shutdown.
    #[arg(long, env = "SNOOZER_SHUTDOWN_TIMEOUT", default_value_t = 30)]
    shutdown_timeout: u64,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(tick) = cli.tick_secs {
        config.scheduler.tick_secs = tick;
    }
    if cli.environment_id.is_some() {
        config.railway.environment_id = cli.environment_id.clone();
    }
    config.log_summary();

    let store: Arc<dyn RuleStore> = if cli.in_memory {
        warn!("using in-memory rule store, rules are lost on exit");
        Arc::new(InMemoryRuleStore::new())
    } else {
        if !config.postgres.is_configured() {
            anyhow::bail!("PostgreSQL is not configured: set PG_URL or run with --in-memory");
        }
        Arc::new(
            PgRuleStore::connect(&config.postgres)
                .await
                .context("failed to open the PostgreSQL rule store")?,
        )
    };

    if !config.railway.is_configured() {
        warn!("RAILWAY_API_TOKEN is not set, every dispatch will fail as unauthorized");
    }
    let client: Arc<dyn PlatformClient> = Arc::new(
        RailwayClient::new(&config.railway).context("failed to build the Railway client")?,
    );

    let dispatcher = ActionDispatcher::new(client, config.railway.environment_id.clone());
    let scheduler = RuleScheduler::new(
        store,
        dispatcher,
        SchedulerConfig::from(&config.scheduler),
    );
    let handle = scheduler.spawn();
    info!("snoozer-worker running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown requested");

    match tokio::time::timeout(Duration::from_secs(cli.shutdown_timeout), handle.shutdown()).await
    {
        Ok(()) => info!("snoozer-worker exited cleanly"),
        Err(_) => warn!(
            timeout_secs = cli.shutdown_timeout,
            "scheduler did not stop in time, exiting anyway"
        ),
    }
    Ok(())
}
