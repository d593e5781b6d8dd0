//! # GovWatch — on-chain governance watcher
//!
//! Scans the chain for Reality Module proposals and oracle answers of
//! the configured Snapshot spaces and fans notifications out to the
//! configured channels.
//!
//! Usage:
//!   govwatch                        # Use ./govwatch.toml (env vars override)
//!   govwatch --config /etc/gw.toml  # Custom config path
//!   govwatch --verbose              # Debug logging

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use govwatch_channels::{NotificationDispatcher, build_channels};
use govwatch_core::config::{GovWatchConfig, parse_spaces};
use govwatch_core::lifecycle::{LifecycleObserver, LogObserver};
use govwatch_engine::rpc::RpcClient;
use govwatch_engine::scanner::RpcScanner;
use govwatch_engine::{EventScanner, ProposalTracker, SchedulerLoop, SpaceRegistry, heartbeat};
use govwatch_store::{PgStore, Store};

#[derive(Parser)]
#[command(
    name = "govwatch",
    version,
    about = "Watches on-chain governance proposals and answers"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "govwatch.toml")]
    config: String,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "govwatch=debug"
    } else {
        "govwatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = shellexpand::tilde(&cli.config).to_string();
    let config = GovWatchConfig::load_from(Path::new(&config_path))?;
    config.validate()?;
    let spaces = parse_spaces(&config.spaces)?;

    let store = Arc::new(PgStore::connect(&config.db_uri).await?);
    store.ping().await?;

    let observer: Arc<dyn LifecycleObserver> = Arc::new(LogObserver);

    let channels = build_channels(&config.channel, observer.as_ref());
    if channels.is_empty() {
        tracing::warn!("No notification channel is configured; events will only be persisted");
    }
    let store_dyn: Arc<dyn Store> = store.clone();
    let dispatcher = Arc::new(NotificationDispatcher::new(store_dyn.clone(), channels));

    let scanner: Arc<dyn EventScanner> =
        Arc::new(RpcScanner::new(RpcClient::new(&config.rpc_url)));
    let directory = govwatch_engine::directory::SnapshotDirectory::new(
        &config.snapshot_graphql_url,
        RpcClient::new(&config.rpc_url),
    );

    let registry = SpaceRegistry::new(store_dyn.clone(), Arc::new(directory));
    let spaces = registry.initialize(&spaces).await?;
    tracing::info!("Watching {} space(s)", spaces.len());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let heartbeat_task = config.heartbeat.url.clone().map(|url| {
        heartbeat::spawn(
            url,
            Duration::from_secs(config.heartbeat.interval_secs),
            observer.clone(),
            shutdown_rx.clone(),
        )
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let tracker = ProposalTracker::new(
        store_dyn.clone(),
        scanner.clone(),
        dispatcher,
        observer.clone(),
    );
    let scheduler = SchedulerLoop::new(
        store_dyn,
        scanner,
        tracker,
        observer,
        Duration::from_secs(config.cooldown_secs),
        config.max_blocks_batch_size,
    );
    scheduler.run(spaces, shutdown_rx).await;

    if let Some(task) = heartbeat_task {
        task.abort();
    }
    store.close().await;

    Ok(())
}
