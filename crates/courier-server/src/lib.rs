//! Wiring for the courier server binary: configuration, the reactor worker,
//! the outbox relay, and the HTTP router.

use std::{convert::Infallible, path::PathBuf, sync::Arc, time::Duration};

use axum::{Json, Router, routing::get};
use courier_core::{
  engine::LifecycleEngine,
  reactor::{InvoiceReactor, Notification, NotificationReactor, NotificationSender},
  signal::{self, Reactor, ReactorWorker},
  store::ShipmentStore,
};
use courier_store_sqlite::SqliteStore;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `COURIER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  /// How often unpublished outbox signals are re-queued.
  #[serde(default = "default_relay_interval_secs")]
  pub relay_interval_secs: u64,
  #[serde(default = "default_relay_batch_size")]
  pub relay_batch_size:    usize,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/courier/courier.db") }
fn default_relay_interval_secs() -> u64 { 30 }
fn default_relay_batch_size() -> usize { 100 }

// ─── Notification sender ─────────────────────────────────────────────────────

/// Hands notifications to the log. Stands in for a real provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSender;

impl NotificationSender for LogSender {
  type Error = Infallible;

  async fn send<'a>(&'a self, notification: &'a Notification) -> Result<(), Infallible> {
    tracing::info!(
      event = notification.event,
      channel = notification.channel.as_str(),
      customer_id = %notification.customer_id,
      tracking_number = %notification.tracking_number,
      "notification sent"
    );
    Ok(())
  }
}

// ─── Background tasks ────────────────────────────────────────────────────────

/// The engine plus the background tasks that drain its signals.
pub struct Services {
  pub engine: Arc<LifecycleEngine<SqliteStore>>,
  pub worker: JoinHandle<()>,
  pub relay:  JoinHandle<()>,
}

/// Build the engine over `store` and spawn the reactor worker and the outbox
/// relay. Must be called inside a tokio runtime.
pub fn start(store: SqliteStore, cfg: &ServerConfig) -> Services {
  let store = Arc::new(store);
  let (tx, rx) = signal::channel();
  let engine = Arc::new(LifecycleEngine::new(store.clone(), tx));

  let reactors: Vec<Arc<dyn Reactor>> = vec![
    Arc::new(InvoiceReactor::new(store.clone())),
    Arc::new(NotificationReactor::new(store.clone(), Arc::new(LogSender))),
  ];
  let worker = tokio::spawn(ReactorWorker::new(store, reactors).run(rx));

  let relay = tokio::spawn(relay_loop(
    engine.clone(),
    Duration::from_secs(cfg.relay_interval_secs.max(1)),
    cfg.relay_batch_size,
  ));

  Services { engine, worker, relay }
}

/// Periodically re-queue outbox signals that no worker has marked published.
pub async fn relay_loop<S: ShipmentStore>(
  engine: Arc<LifecycleEngine<S>>,
  every: Duration,
  batch: usize,
) {
  let mut ticker = tokio::time::interval(every);
  // The first tick fires immediately; let freshly emitted signals settle.
  ticker.tick().await;
  loop {
    ticker.tick().await;
    if let Err(e) = engine.relay_pending(batch).await {
      tracing::warn!(error = %e, "outbox relay failed");
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The full HTTP surface: the API under `/api` plus a health probe.
pub fn router<S: ShipmentStore + 'static>(engine: Arc<LifecycleEngine<S>>) -> Router {
  Router::new()
    .route("/healthz", get(healthz))
    .nest("/api", courier_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}

async fn healthz() -> Json<Value> { Json(json!({ "status": "ok" })) }
