//! Transition planning: the rules for applying a status change to a
//! shipment, independent of storage.
//!
//! A store calls [`apply`] on a shipment it has read inside a transaction,
//! then persists the mutated shipment and the returned
//! [`ShipmentTransition`] in that same transaction. All validation happens
//! before the shipment is touched, so an `Err` leaves it unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  context::{ContextSnapshot, TransitionContext, TransitionSource, Trigger},
  shipment::{ExceptionState, Milestones, NewShipment, Shipment},
  status::Status,
  transition::is_transition_allowed,
};

// ─── Audit record ────────────────────────────────────────────────────────────

/// One accepted transition. Append-only: never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentTransition {
  pub transition_id: Uuid,
  pub shipment_id:   Uuid,
  /// `None` only for the booking transition.
  pub from_status:   Option<Status>,
  pub to_status:     Status,
  pub trigger:       Trigger,
  pub source:        TransitionSource,
  pub performed_by:  Option<Uuid>,
  pub forced:        bool,
  pub context:       ContextSnapshot,
  pub recorded_at:   DateTime<Utc>,
}

// ─── Planning ────────────────────────────────────────────────────────────────

/// Build a freshly booked shipment and its first transition record.
pub fn book(
  input: NewShipment,
  ctx: &TransitionContext,
  now: DateTime<Utc>,
) -> Result<(Shipment, ShipmentTransition)> {
  if input.tracking_number.trim().is_empty() {
    return Err(Error::InvalidArgument("tracking_number is empty".into()));
  }
  if input.awb_number.trim().is_empty() {
    return Err(Error::InvalidArgument("awb_number is empty".into()));
  }
  if !is_transition_allowed(None, Status::Booked) {
    return Err(Error::IllegalTransition { from: None, to: Status::Booked });
  }

  let effective_at = ctx.timestamp.unwrap_or(now);
  let shipment = Shipment {
    shipment_id:        Uuid::new_v4(),
    tracking_number:    input.tracking_number,
    awb_number:         input.awb_number,
    customer_id:        input.customer_id,
    current_status:     Status::Booked,
    location:           ctx.location.or(input.location),
    milestones:         Milestones {
      booked_at: Some(effective_at),
      ..Milestones::default()
    },
    exception:          ExceptionState::default(),
    return_details:     None,
    last_scan_event_id: None,
    created_at:         now,
    updated_at:         now,
    lock_version:       0,
  };

  let record = record_for(&shipment, None, Status::Booked, ctx, effective_at, now);
  Ok((shipment, record))
}

/// Apply `target` to `shipment` and return the audit record to append.
///
/// Fails with [`Error::IllegalTransition`] when the table forbids the move
/// and `ctx.force` is unset, and with [`Error::MissingExceptionDetails`] when
/// entering EXCEPTION without details.
pub fn apply(
  shipment: &mut Shipment,
  target: Status,
  ctx: &TransitionContext,
  now: DateTime<Utc>,
) -> Result<ShipmentTransition> {
  let from = shipment.current_status;

  if !ctx.force && !is_transition_allowed(Some(from), target) {
    return Err(Error::IllegalTransition { from: Some(from), to: target });
  }
  if target == Status::Exception && ctx.exception.is_none() {
    return Err(Error::MissingExceptionDetails);
  }

  let effective_at = ctx.timestamp.unwrap_or(now);

  shipment.current_status = target;

  if let Some(column) = target.timestamp_column() {
    let slot = shipment.milestones.slot_mut(column);
    if slot.is_none() || ctx.overwrite_timestamp {
      *slot = Some(effective_at);
    }
  }

  if let Some(location) = ctx.location {
    shipment.location = Some(location);
  }

  if let Some(scan) = ctx.scan_event {
    shipment.last_scan_event_id = Some(scan);
  }

  match target {
    // Only entry populates the exception state; a repeated EXCEPTION keeps
    // the original occurrence unless it has since been resolved.
    Status::Exception
      if from != Status::Exception || !shipment.exception.has_exception =>
    {
      shipment.exception = ExceptionState {
        has_exception: true,
        details:       ctx.exception.clone(),
        occurred_at:   Some(effective_at),
      };
    }
    Status::ReturnInitiated => {
      if let Some(details) = &ctx.return_details {
        shipment.return_details = Some(details.clone());
      }
    }
    _ => {}
  }

  shipment.updated_at = now;

  Ok(record_for(shipment, Some(from), target, ctx, effective_at, now))
}

/// Clear the exception flag and details. Returns `false` when there was
/// nothing to clear.
pub fn resolve_exception(shipment: &mut Shipment, now: DateTime<Utc>) -> bool {
  if shipment.exception == ExceptionState::default() {
    return false;
  }
  shipment.exception = ExceptionState::default();
  shipment.updated_at = now;
  true
}

fn record_for(
  shipment: &Shipment,
  from: Option<Status>,
  to: Status,
  ctx: &TransitionContext,
  effective_at: DateTime<Utc>,
  now: DateTime<Utc>,
) -> ShipmentTransition {
  ShipmentTransition {
    transition_id: Uuid::new_v4(),
    shipment_id:   shipment.shipment_id,
    from_status:   from,
    to_status:     to,
    trigger:       ctx.effective_trigger(),
    source:        ctx.effective_source(),
    performed_by:  ctx.performed_by,
    forced:        ctx.force,
    context:       ctx.snapshot(effective_at),
    recorded_at:   now,
  }
}
