//! Command-line entrypoint for mysql-es-sync
//!
//! ```bash
//! # One sync pass with the default config location
//! mysql-es-sync
//!
//! # Explicit config file, verbose logging
//! RUST_LOG=mysql_es_sync=debug mysql-es-sync --config /etc/mysql-es-sync.json
//! ```

use anyhow::Context;
use checkpoint::{CheckpointStore, MySqlStore};
use clap::Parser;
use mysql_es_sync::backpressure::BackpressureGate;
use mysql_es_sync::config::Config;
use mysql_es_sync::es::{EsClient, SearchIndex};
use mysql_es_sync::retry::RetryPolicy;
use mysql_es_sync::{sync, SyncContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "mysql-es-sync")]
#[command(about = "Incremental MySQL to Elasticsearch synchronization")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(
        long,
        default_value = "config/config.json",
        env = "MYSQL_ES_SYNC_CONFIG"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let pool = mysql_async::Pool::new(config.mysql_opts());
    let index: Arc<dyn SearchIndex> =
        Arc::new(EsClient::from_config(&config.es).context("Failed to build the index client")?);
    let store: Arc<dyn CheckpointStore> = Arc::new(MySqlStore::new(pool.clone()));
    store
        .ensure_schema()
        .await
        .context("Failed to prepare the sync-log table")?;

    let ctx = SyncContext {
        config,
        pool: pool.clone(),
        index,
        store,
        gate: BackpressureGate::default(),
        retry: RetryPolicy::default(),
    };

    let outcome = sync::run(&ctx).await?;
    info!("Sync pass finished: {outcome}");

    pool.disconnect().await?;

    if let Some(error) = outcome.first_error {
        anyhow::bail!("Sync pass completed with failures, first error: {error}");
    }
    Ok(())
}
