//! The `ShipmentStore` trait — the persistence seam under the lifecycle
//! engine.
//!
//! The trait is implemented by storage backends (e.g.
//! `courier-store-sqlite`). Each mutating method is one all-or-nothing
//! unit: the shipment write, the audit row, the scan row and the outbox
//! signal either all commit or none do. Writes to the same shipment are
//! serialized by the backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  context::TransitionContext,
  error::AsCoreError,
  lifecycle::ShipmentTransition,
  scan::{ScanEvent, ScanSubmission},
  shipment::{Bag, NewShipment, Parcel, Shipment},
  signal::StatusChanged,
  status::Status,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// A committed transition together with the signal written to the outbox.
#[derive(Debug, Clone)]
pub struct Committed {
  pub shipment:   Shipment,
  pub transition: ShipmentTransition,
  pub signal:     StatusChanged,
}

/// A committed scan. `committed` is `None` when the scan resolved no
/// shipment or implied no status.
#[derive(Debug, Clone)]
pub struct ScanRecorded {
  pub scan_event: ScanEvent,
  pub committed:  Option<Committed>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a shipment store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ShipmentStore: Send + Sync {
  type Error: std::error::Error
    + From<crate::Error>
    + AsCoreError
    + Send
    + Sync
    + 'static;

  // ── Shipments ─────────────────────────────────────────────────────────

  /// Create a shipment in BOOKED and write its first transition.
  fn book(
    &self,
    input: NewShipment,
    ctx: TransitionContext,
  ) -> impl Future<Output = Result<Committed, Self::Error>> + Send + '_;

  fn get_shipment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Shipment>, Self::Error>> + Send + '_;

  fn find_by_tracking_number<'a>(
    &'a self,
    tracking_number: &'a str,
  ) -> impl Future<Output = Result<Option<Shipment>, Self::Error>> + Send + 'a;

  // ── Physical entities ─────────────────────────────────────────────────

  /// Attach a parcel with the given SSCC to a shipment.
  fn register_parcel(
    &self,
    shipment_id: Uuid,
    sscc: String,
  ) -> impl Future<Output = Result<Parcel, Self::Error>> + Send + '_;

  fn register_bag(
    &self,
    code: String,
  ) -> impl Future<Output = Result<Bag, Self::Error>> + Send + '_;

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Validate and apply a transition atomically.
  ///
  /// Fails with `IllegalTransition` (no write) when the table forbids the
  /// move and `ctx.force` is unset.
  fn transition(
    &self,
    shipment_id: Uuid,
    target: Status,
    ctx: TransitionContext,
  ) -> impl Future<Output = Result<Committed, Self::Error>> + Send + '_;

  /// Store a scan and apply the transition it implies, atomically.
  ///
  /// If the transition fails the scan is not stored either.
  fn record_scan(
    &self,
    scan: ScanSubmission,
  ) -> impl Future<Output = Result<ScanRecorded, Self::Error>> + Send + '_;

  /// Clear the exception flag and details.
  fn resolve_exception(
    &self,
    shipment_id: Uuid,
  ) -> impl Future<Output = Result<Shipment, Self::Error>> + Send + '_;

  // ── History ───────────────────────────────────────────────────────────

  /// Transition records for a shipment, oldest first.
  fn transitions(
    &self,
    shipment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ShipmentTransition>, Self::Error>> + Send + '_;

  /// Scan events for a shipment, oldest first.
  fn scan_events(
    &self,
    shipment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ScanEvent>, Self::Error>> + Send + '_;

  // ── Outbox ────────────────────────────────────────────────────────────

  /// Signals not yet marked published, oldest first.
  fn pending_signals(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<StatusChanged>, Self::Error>> + Send + '_;

  fn mark_signal_published(
    &self,
    signal_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
