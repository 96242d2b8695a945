//! [`LifecycleEngine`] — the single entry point that changes a shipment's
//! lifecycle state.
//!
//! The engine validates input, hands the atomic unit to the store, and
//! raises the status-changed signal only after the store has committed.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
  context::TransitionContext,
  lifecycle::ShipmentTransition,
  scan::{ScanAttributes, ScanEvent, ScanSubmission},
  shipment::{NewShipment, Shipment},
  signal::{SignalSender, StatusChanged},
  status::Status,
  store::{Committed, ShipmentStore},
  transition,
};

pub struct LifecycleEngine<S> {
  store:   Arc<S>,
  signals: SignalSender,
}

impl<S: ShipmentStore> LifecycleEngine<S> {
  pub fn new(store: Arc<S>, signals: SignalSender) -> Self {
    Self { store, signals }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Book a new shipment on behalf of `actor`.
  pub async fn book(
    &self,
    input: NewShipment,
    actor: Option<Uuid>,
  ) -> Result<Shipment, S::Error> {
    let ctx = TransitionContext { performed_by: actor, ..Default::default() };
    let committed = self.store.book(input, ctx).await?;
    tracing::info!(
      shipment_id = %committed.shipment.shipment_id,
      tracking_number = %committed.shipment.tracking_number,
      "shipment booked"
    );
    Ok(self.publish(committed).shipment)
  }

  /// Move a shipment to `target`.
  pub async fn transition(
    &self,
    shipment_id: Uuid,
    target: Status,
    ctx: TransitionContext,
  ) -> Result<ShipmentTransition, S::Error> {
    let forced = ctx.force;
    let committed = self.store.transition(shipment_id, target, ctx).await?;
    tracing::info!(
      %shipment_id,
      from = ?committed.transition.from_status,
      to = %committed.transition.to_status,
      forced,
      "shipment transitioned"
    );
    Ok(self.publish(committed).transition)
  }

  /// The statuses reachable in one step from `current`.
  pub fn allowed_next_statuses(current: Option<Status>) -> &'static [Status] {
    transition::allowed_next_statuses(current)
  }

  /// Ingest a raw scan. Returns the stored scan event with `status_after`
  /// filled in when the scan moved its shipment.
  ///
  /// `actor` is the ambient request identity, used when the scan names no
  /// user.
  pub async fn record(
    &self,
    attrs: ScanAttributes,
    actor: Option<Uuid>,
  ) -> Result<ScanEvent, S::Error> {
    let submission = ScanSubmission::parse(attrs, actor, Utc::now())?;
    let recorded = self.store.record_scan(submission).await?;

    let scan = &recorded.scan_event;
    tracing::debug!(
      scan_event_id = %scan.scan_event_id,
      scan_type = %scan.scan_type,
      shipment_id = ?scan.shipment_id,
      status_after = ?scan.status_after,
      "scan recorded"
    );
    if let Some(committed) = recorded.committed {
      self.publish(committed);
    }
    Ok(recorded.scan_event)
  }

  /// Clear a shipment's exception state. This is the only path that does.
  pub async fn resolve_exception(
    &self,
    shipment_id: Uuid,
  ) -> Result<Shipment, S::Error> {
    let shipment = self.store.resolve_exception(shipment_id).await?;
    tracing::info!(%shipment_id, "exception resolved");
    Ok(shipment)
  }

  /// Re-queue up to `limit` signals still marked unpublished in the outbox.
  pub async fn relay_pending(&self, limit: usize) -> Result<usize, S::Error> {
    let pending = self.store.pending_signals(limit).await?;
    let count = pending.len();
    for signal in pending {
      self.emit(signal);
    }
    if count > 0 {
      tracing::debug!(count, "re-queued pending signals");
    }
    Ok(count)
  }

  fn publish(&self, committed: Committed) -> Committed {
    self.emit(committed.signal.clone());
    committed
  }

  /// Delivery failure never undoes a committed transition: the signal stays
  /// in the outbox and the relay picks it up later.
  fn emit(&self, signal: StatusChanged) {
    if let Err(e) = self.signals.emit(signal) {
      tracing::warn!(error = %e, "status-changed signal not delivered");
    }
  }
}
