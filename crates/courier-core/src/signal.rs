//! The status-changed signal and the queue that carries it to reactors.
//!
//! Stores write every signal to an outbox in the same transaction as the
//! transition it describes. After commit the engine pushes it onto an
//! in-process queue; a [`ReactorWorker`] drains the queue and marks the
//! outbox row published once every reactor has accepted it. Rows left
//! unpublished are re-queued by the relay, so delivery is at-least-once and
//! reactors must be idempotent.

use std::{future::Future, pin::Pin, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
  lifecycle::ShipmentTransition, scan::ScanEvent, shipment::Shipment,
  store::ShipmentStore,
};

// ─── Signal ──────────────────────────────────────────────────────────────────

/// Raised after a transition commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChanged {
  pub signal_id:  Uuid,
  /// The shipment as committed.
  pub shipment:   Shipment,
  pub transition: ShipmentTransition,
  /// The scan that triggered the transition, with `status_after` filled in.
  pub scan_event: Option<ScanEvent>,
  pub emitted_at: DateTime<Utc>,
}

impl StatusChanged {
  pub fn new(
    shipment: Shipment,
    transition: ShipmentTransition,
    scan_event: Option<ScanEvent>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      signal_id: Uuid::new_v4(),
      shipment,
      transition,
      scan_event,
      emitted_at: now,
    }
  }
}

// ─── Queue ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("signal queue is closed; signal {0} stays in the outbox")]
pub struct QueueClosed(pub Uuid);

/// Sending half of the signal queue.
#[derive(Debug, Clone)]
pub struct SignalSender {
  tx: mpsc::UnboundedSender<StatusChanged>,
}

impl SignalSender {
  pub fn emit(&self, signal: StatusChanged) -> Result<(), QueueClosed> {
    let id = signal.signal_id;
    self.tx.send(signal).map_err(|_| QueueClosed(id))
  }
}

/// Receiving half of the signal queue.
#[derive(Debug)]
pub struct SignalReceiver {
  rx: mpsc::UnboundedReceiver<StatusChanged>,
}

impl SignalReceiver {
  pub async fn recv(&mut self) -> Option<StatusChanged> { self.rx.recv().await }
}

pub fn channel() -> (SignalSender, SignalReceiver) {
  let (tx, rx) = mpsc::unbounded_channel();
  (SignalSender { tx }, SignalReceiver { rx })
}

// ─── Reactors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("{source}")]
pub struct ReactorError {
  source: Box<dyn std::error::Error + Send + Sync>,
}

impl ReactorError {
  pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self { source: source.into() }
  }
}

pub type ReactorFuture<'a> =
  Pin<Box<dyn Future<Output = Result<(), ReactorError>> + Send + 'a>>;

/// A downstream consumer of [`StatusChanged`]. May see the same signal more
/// than once.
pub trait Reactor: Send + Sync {
  fn name(&self) -> &'static str;

  fn react<'a>(&'a self, signal: &'a StatusChanged) -> ReactorFuture<'a>;
}

// ─── Worker ──────────────────────────────────────────────────────────────────

/// Runs every reactor for each queued signal and marks it published in the
/// store's outbox when all of them succeed.
pub struct ReactorWorker<S> {
  store:    Arc<S>,
  reactors: Vec<Arc<dyn Reactor>>,
}

impl<S: ShipmentStore> ReactorWorker<S> {
  pub fn new(store: Arc<S>, reactors: Vec<Arc<dyn Reactor>>) -> Self {
    Self { store, reactors }
  }

  /// Drain `rx` until every sender is dropped.
  pub async fn run(self, mut rx: SignalReceiver) {
    while let Some(signal) = rx.recv().await {
      self.handle(&signal).await;
    }
    tracing::debug!("signal queue closed; reactor worker exiting");
  }

  /// Deliver one signal. Returns `true` if it was marked published.
  pub async fn handle(&self, signal: &StatusChanged) -> bool {
    let mut delivered = true;
    for reactor in &self.reactors {
      if let Err(e) = reactor.react(signal).await {
        delivered = false;
        tracing::error!(
          reactor = reactor.name(),
          signal_id = %signal.signal_id,
          shipment_id = %signal.shipment.shipment_id,
          error = %e,
          "reactor failed; signal left in outbox for retry"
        );
      }
    }
    if !delivered {
      return false;
    }
    match self.store.mark_signal_published(signal.signal_id).await {
      Ok(()) => true,
      Err(e) => {
        tracing::warn!(signal_id = %signal.signal_id, error = %e, "failed to mark signal published");
        false
      }
    }
  }
}
