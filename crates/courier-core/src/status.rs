//! The status catalog — the closed set of lifecycle states a shipment can
//! occupy, and the milestone timestamp each one stamps on first entry.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator as _, IntoStaticStr};

use crate::Error;

// ─── Status ──────────────────────────────────────────────────────────────────

/// A lifecycle status from the closed catalog.
///
/// The canonical spelling is SCREAMING_SNAKE_CASE. The lowercase form is a
/// derived projection ([`Status::mirror`]) written alongside for legacy
/// readers; it is never set independently.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
  Booked,
  PickupScheduled,
  PickedUp,
  AtOriginHub,
  Bagged,
  LinehaulDeparted,
  LinehaulArrived,
  AtDestinationHub,
  CustomsHold,
  CustomsCleared,
  OutForDelivery,
  Delivered,
  ReturnInitiated,
  ReturnInTransit,
  Returned,
  Exception,
  Cancelled,
}

impl Status {
  /// Canonical name, e.g. `"PICKED_UP"`.
  pub fn as_str(self) -> &'static str { self.into() }

  /// The lowercase mirror written to the legacy `status` column.
  pub fn mirror(self) -> String { self.as_str().to_ascii_lowercase() }

  /// `true` for DELIVERED, RETURNED and CANCELLED.
  ///
  /// EXCEPTION is not terminal: a shipment recovers from it through further
  /// transitions.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Delivered | Self::Returned | Self::Cancelled)
  }

  /// The milestone column this status stamps on first entry, if any.
  pub fn timestamp_column(self) -> Option<TimestampColumn> {
    use TimestampColumn as C;
    Some(match self {
      Self::Booked => C::BookedAt,
      Self::PickupScheduled => C::PickupScheduledAt,
      Self::PickedUp => C::PickedUpAt,
      Self::AtOriginHub => C::OriginHubAt,
      Self::Bagged => C::BaggedAt,
      Self::LinehaulDeparted => C::LinehaulDepartedAt,
      Self::LinehaulArrived => C::LinehaulArrivedAt,
      Self::AtDestinationHub => C::DestinationHubAt,
      Self::CustomsHold => C::CustomsHoldAt,
      Self::CustomsCleared => C::CustomsClearedAt,
      Self::OutForDelivery => C::OutForDeliveryAt,
      Self::Delivered => C::DeliveredAt,
      Self::ReturnInitiated => C::ReturnInitiatedAt,
      Self::Returned => C::ReturnedAt,
      Self::Cancelled => C::CancelledAt,
      Self::ReturnInTransit | Self::Exception => return None,
    })
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Accepts exactly the canonical name or its lowercase mirror. Anything else,
/// mixed case included, is rejected with [`Error::UnknownStatus`].
impl FromStr for Status {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::iter()
      .find(|status| status.as_str() == s || status.mirror() == s)
      .ok_or_else(|| Error::UnknownStatus(s.to_owned()))
  }
}

// ─── Milestone columns ───────────────────────────────────────────────────────

/// One write-once timestamp column on the shipment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum TimestampColumn {
  BookedAt,
  PickupScheduledAt,
  PickedUpAt,
  OriginHubAt,
  BaggedAt,
  LinehaulDepartedAt,
  LinehaulArrivedAt,
  DestinationHubAt,
  CustomsHoldAt,
  CustomsClearedAt,
  OutForDeliveryAt,
  DeliveredAt,
  ReturnInitiatedAt,
  ReturnedAt,
  CancelledAt,
}

impl TimestampColumn {
  pub fn column_name(self) -> &'static str {
    match self {
      Self::BookedAt => "booked_at",
      Self::PickupScheduledAt => "pickup_scheduled_at",
      Self::PickedUpAt => "picked_up_at",
      Self::OriginHubAt => "origin_hub_at",
      Self::BaggedAt => "bagged_at",
      Self::LinehaulDepartedAt => "linehaul_departed_at",
      Self::LinehaulArrivedAt => "linehaul_arrived_at",
      Self::DestinationHubAt => "destination_hub_at",
      Self::CustomsHoldAt => "customs_hold_at",
      Self::CustomsClearedAt => "customs_cleared_at",
      Self::OutForDeliveryAt => "out_for_delivery_at",
      Self::DeliveredAt => "delivered_at",
      Self::ReturnInitiatedAt => "return_initiated_at",
      Self::ReturnedAt => "returned_at",
      Self::CancelledAt => "cancelled_at",
    }
  }
}
