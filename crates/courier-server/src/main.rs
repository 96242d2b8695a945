//! courier-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `COURIER_*` environment variables, opens the SQLite store at
//! `store_path`, starts the reactor worker and the outbox relay, and serves
//! the JSON API under `/api` plus `/healthz`.
//!
//! ```
//! COURIER_PORT=9000 cargo run -p courier-server -- --config courier.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use courier_server::ServerConfig;
use courier_store_sqlite::SqliteStore;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

#[derive(Parser)]
#[command(about = "Shipment lifecycle HTTP server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(long, short, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg: ServerConfig = config::Config::builder()
    .add_source(config::File::from(cli.config.as_path()).required(false))
    .add_source(config::Environment::with_prefix("COURIER"))
    .build()
    .context("failed to build configuration")?
    .try_deserialize()
    .context("failed to deserialize server configuration")?;

  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).with_context(|| {
      format!("failed to create store directory {}", parent.display())
    })?;
  }

  let store = SqliteStore::open(&store_path).await.with_context(|| {
    format!("failed to open store at {}", store_path.display())
  })?;

  let services = courier_server::start(store, &cfg);
  let app = courier_server::router(services.engine.clone());

  let addr = format!("{}:{}", cfg.host, cfg.port);
  let listener = tokio::net::TcpListener::bind(&addr)
    .await
    .with_context(|| format!("failed to bind {addr}"))?;
  tracing::info!(%addr, store = %store_path.display(), "courier server listening");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  services.relay.abort();
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

fn expand_tilde(path: &Path) -> PathBuf {
  if let Ok(rest) = path.strip_prefix("~")
    && let Some(home) = std::env::var_os("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
