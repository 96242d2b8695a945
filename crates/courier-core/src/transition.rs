//! The transition table — the directed graph of legal status moves.
//!
//! ```text
//! BOOKED ─▶ PICKUP_SCHEDULED ─▶ PICKED_UP ─▶ AT_ORIGIN_HUB ─▶ BAGGED
//!                                                  │            │
//!                                                  ▼            ▼
//!                                            LINEHAUL_DEPARTED ◀┘
//!                                                  │
//!                                                  ▼
//!                 CUSTOMS_HOLD ◀── LINEHAUL_ARRIVED ─▶ AT_DESTINATION_HUB
//!                      │                                   │
//!                      ▼                                   ▼
//!               CUSTOMS_CLEARED ─────────────────▶ OUT_FOR_DELIVERY ─▶ DELIVERED
//!
//! RETURN_INITIATED ─▶ RETURN_IN_TRANSIT ─▶ RETURNED
//! ```
//!
//! Mid-flow states may also exit early to EXCEPTION, CANCELLED or
//! RETURN_INITIATED where the table says so. Terminal states have no entry.

use crate::status::Status;

use Status::*;

/// The only legal entry point for a shipment that does not exist yet.
const ENTRY: &[Status] = &[Booked];

/// Outgoing edges for `from`, in canonical order. Empty for terminal states.
fn edges(from: Status) -> &'static [Status] {
  match from {
    Booked => &[PickupScheduled, PickedUp, Exception, Cancelled],
    PickupScheduled => &[PickedUp, Exception, Cancelled],
    PickedUp => &[AtOriginHub, Exception, Cancelled, ReturnInitiated],
    AtOriginHub => &[
      Bagged,
      LinehaulDeparted,
      Exception,
      Cancelled,
      ReturnInitiated,
    ],
    Bagged => &[LinehaulDeparted, Exception, ReturnInitiated],
    LinehaulDeparted => &[LinehaulArrived, Exception],
    LinehaulArrived => &[AtDestinationHub, CustomsHold, Exception],
    AtDestinationHub => &[
      CustomsHold,
      OutForDelivery,
      Exception,
      ReturnInitiated,
    ],
    CustomsHold => &[CustomsCleared, Exception, ReturnInitiated],
    CustomsCleared => &[AtDestinationHub, OutForDelivery, Exception],
    OutForDelivery => &[Delivered, Exception, ReturnInitiated],
    ReturnInitiated => &[ReturnInTransit, Returned, Exception],
    ReturnInTransit => &[Returned, Exception],
    Exception => &[
      AtDestinationHub,
      OutForDelivery,
      ReturnInitiated,
      Cancelled,
    ],
    Delivered | Returned | Cancelled => &[],
  }
}

/// The statuses reachable in one step from `current`.
///
/// `None` means no shipment exists yet, for which the answer is exactly
/// `[BOOKED]`.
pub fn allowed_next_statuses(current: Option<Status>) -> &'static [Status] {
  match current {
    None => ENTRY,
    Some(status) => edges(status),
  }
}

/// Whether moving from `from` to `to` is legal without `force`.
///
/// Re-applying the current status is always legal, which absorbs duplicate
/// scan deliveries.
pub fn is_transition_allowed(from: Option<Status>, to: Status) -> bool {
  match from {
    Some(from) if from == to => true,
    Some(from) if from.is_terminal() => false,
    _ => allowed_next_statuses(from).contains(&to),
  }
}
