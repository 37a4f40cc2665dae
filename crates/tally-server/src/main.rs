//! tally-server binary.
//!
//! Reads `tally.toml` (or the path given with `--config`) plus `TALLY_*`
//! environment overrides, opens the SQLite store, and serves the engagement
//! API over HTTP.
//!
//! # Counter repair
//!
//! To recompute counters from the fact tables once and exit:
//!
//! ```text
//! cargo run -p tally-server -- --reconcile
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use tally_core::store::EngagementStore;
use tally_server::{ServerConfig, maintenance};
use tally_spotlight::{MemorySpotlightCache, spawn_sweeper};
use tally_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tally engagement server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tally.toml")]
  config: PathBuf,

  /// Reconcile counters against the fact tables and exit.
  #[arg(long)]
  reconcile: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let store_path = cfg.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_policy(cfg.store_policy());
  let store = Arc::new(store);

  // Helper mode: repair counters and exit.
  if cli.reconcile {
    let corrected = store
      .reconcile_counters()
      .await
      .context("failed to reconcile counters")?;
    println!("{corrected} content item(s) corrected");
    return Ok(());
  }

  let cache = Arc::new(MemorySpotlightCache::with_ttl(cfg.spotlight_ttl()));
  let sweeper = spawn_sweeper(Arc::clone(&cache), cfg.spotlight_sweep());
  let upkeep = maintenance::spawn(
    Arc::clone(&store),
    cfg.maintenance_interval(),
    cfg.view_retention(),
  );

  let app = tally_server::router(store, cache);
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  sweeper.abort();
  upkeep.abort();
  Ok(())
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl+C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  tracing::info!("shutting down");
}
