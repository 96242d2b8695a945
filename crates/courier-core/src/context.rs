//! Transition context — the options a caller passes alongside a target
//! status — and the sanitized snapshot of it stored on the audit row.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shipment::{ExceptionDetails, Location, ReturnDetails};

// ─── Trigger & source ────────────────────────────────────────────────────────

/// What kind of event caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
  Manual,
  ScanEvent,
  Other,
}

impl Trigger {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Manual => "manual",
      Self::ScanEvent => "scan_event",
      Self::Other => "other",
    }
  }
}

/// The entity that caused a transition, stored as `source_type`/`source_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum TransitionSource {
  ScanEvent(Uuid),
  ManualAction(Uuid),
  SystemTimer,
}

impl TransitionSource {
  pub fn source_type(&self) -> &'static str {
    match self {
      Self::ScanEvent(_) => "scan_event",
      Self::ManualAction(_) => "manual_action",
      Self::SystemTimer => "system_timer",
    }
  }

  pub fn source_id(&self) -> Option<Uuid> {
    match self {
      Self::ScanEvent(id) | Self::ManualAction(id) => Some(*id),
      Self::SystemTimer => None,
    }
  }

  pub fn from_parts(source_type: &str, source_id: Option<Uuid>) -> Option<Self> {
    match (source_type, source_id) {
      ("scan_event", Some(id)) => Some(Self::ScanEvent(id)),
      ("manual_action", Some(id)) => Some(Self::ManualAction(id)),
      ("system_timer", _) => Some(Self::SystemTimer),
      _ => None,
    }
  }
}

// ─── TransitionContext ───────────────────────────────────────────────────────

/// Options for a single transition.
///
/// Every recognized option is an explicit field; genuinely free-form data
/// goes in `metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionContext {
  /// Bypass the transition table.
  #[serde(default)]
  pub force:               bool,
  /// Explicit actor. The request layer resolves the ambient identity and
  /// passes it here; the core never looks it up.
  pub performed_by:        Option<Uuid>,
  /// Effective time of the transition. Defaults to now.
  pub timestamp:           Option<DateTime<Utc>>,
  pub location:            Option<Location>,
  /// The scan event that caused this transition.
  pub scan_event:          Option<Uuid>,
  /// Required when the target is EXCEPTION.
  pub exception:           Option<ExceptionDetails>,
  /// Used when the target is RETURN_INITIATED.
  pub return_details:      Option<ReturnDetails>,
  /// Re-stamp the milestone even when it is already set.
  #[serde(default)]
  pub overwrite_timestamp: bool,
  /// Explicit trigger. Derived from the other fields when absent.
  pub trigger:             Option<Trigger>,
  /// Explicit source. Derived from the other fields when absent.
  pub source:              Option<TransitionSource>,
  #[serde(default)]
  pub metadata:            BTreeMap<String, Value>,
}

impl TransitionContext {
  /// A context with only the actor set.
  pub fn by(actor: Uuid) -> Self {
    Self { performed_by: Some(actor), ..Self::default() }
  }

  pub fn effective_trigger(&self) -> Trigger {
    self.trigger.unwrap_or(if self.scan_event.is_some() {
      Trigger::ScanEvent
    } else if self.performed_by.is_some() {
      Trigger::Manual
    } else {
      Trigger::Other
    })
  }

  pub fn effective_source(&self) -> TransitionSource {
    self.source.unwrap_or(match (self.scan_event, self.performed_by) {
      (Some(scan), _) => TransitionSource::ScanEvent(scan),
      (None, Some(actor)) => TransitionSource::ManualAction(actor),
      (None, None) => TransitionSource::SystemTimer,
    })
  }

  /// Build the snapshot stored on the audit row. Internal switches (`force`,
  /// `overwrite_timestamp`) are dropped, entity references become
  /// `{type, id}` pairs, and metadata is reduced to primitives.
  pub fn snapshot(&self, effective_at: DateTime<Utc>) -> ContextSnapshot {
    ContextSnapshot {
      timestamp:      effective_at,
      location:       self.location,
      scan_event:     self.scan_event.map(|id| EntityRef::new("scan_event", id)),
      performed_by:   self.performed_by.map(|id| EntityRef::new("user", id)),
      exception:      self.exception.clone(),
      return_details: self.return_details.clone(),
      metadata:       sanitize_metadata(&self.metadata),
    }
  }
}

// ─── Stored snapshot ─────────────────────────────────────────────────────────

/// A lightweight `{type, id}` reference to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
  #[serde(rename = "type")]
  pub kind: String,
  pub id:   Uuid,
}

impl EntityRef {
  pub fn new(kind: &str, id: Uuid) -> Self {
    Self { kind: kind.to_owned(), id }
  }
}

/// The context as persisted on a transition record. Holds only
/// identifiers and primitive values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
  pub timestamp:      DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location:       Option<Location>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scan_event:     Option<EntityRef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub performed_by:   Option<EntityRef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exception:      Option<ExceptionDetails>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub return_details: Option<ReturnDetails>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub metadata:       BTreeMap<String, Value>,
}

fn sanitize_metadata(metadata: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
  metadata
    .iter()
    .filter_map(|(k, v)| sanitize_value(v).map(|v| (k.clone(), v)))
    .collect()
}

/// Scalars pass through. Objects shaped like `{type, id}` are reduced to
/// exactly that pair; arrays keep their scalar elements. Anything else is
/// dropped.
fn sanitize_value(value: &Value) -> Option<Value> {
  match value {
    Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
      Some(value.clone())
    }
    Value::Array(items) => Some(Value::Array(
      items.iter().filter(|v| is_scalar(v)).cloned().collect(),
    )),
    Value::Object(map) => match (map.get("type"), map.get("id")) {
      (Some(kind @ Value::String(_)), Some(id)) if is_scalar(id) => {
        Some(serde_json::json!({ "type": kind, "id": id }))
      }
      _ => None,
    },
  }
}

fn is_scalar(value: &Value) -> bool {
  !matches!(value, Value::Array(_) | Value::Object(_))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn trigger_and_source_are_derived() {
    let scan = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let ctx = TransitionContext {
      scan_event: Some(scan),
      performed_by: Some(actor),
      ..Default::default()
    };
    assert_eq!(ctx.effective_trigger(), Trigger::ScanEvent);
    assert_eq!(ctx.effective_source(), TransitionSource::ScanEvent(scan));

    let ctx = TransitionContext::by(actor);
    assert_eq!(ctx.effective_trigger(), Trigger::Manual);
    assert_eq!(ctx.effective_source(), TransitionSource::ManualAction(actor));

    let ctx = TransitionContext::default();
    assert_eq!(ctx.effective_trigger(), Trigger::Other);
    assert_eq!(ctx.effective_source(), TransitionSource::SystemTimer);
  }

  #[test]
  fn snapshot_strips_internal_switches_and_objects() {
    let scan = Uuid::new_v4();
    let mut metadata = BTreeMap::new();
    metadata.insert("device".to_owned(), json!("TC52"));
    metadata.insert("battery".to_owned(), json!(81));
    metadata.insert(
      "route".to_owned(),
      json!({ "type": "route", "id": 7, "stops": [1, 2, 3] }),
    );
    metadata.insert("raw".to_owned(), json!({ "nested": { "deep": true } }));
    metadata.insert("tags".to_owned(), json!(["a", { "x": 1 }, "b"]));

    let ctx = TransitionContext {
      force: true,
      overwrite_timestamp: true,
      scan_event: Some(scan),
      metadata,
      ..Default::default()
    };
    let snap = ctx.snapshot(Utc::now());
    let stored = serde_json::to_value(&snap).unwrap();

    assert!(stored.get("force").is_none());
    assert!(stored.get("overwrite_timestamp").is_none());
    assert_eq!(stored["scan_event"], json!({ "type": "scan_event", "id": scan }));
    assert_eq!(stored["metadata"]["device"], json!("TC52"));
    assert_eq!(stored["metadata"]["route"], json!({ "type": "route", "id": 7 }));
    assert!(stored["metadata"].get("raw").is_none());
    assert_eq!(stored["metadata"]["tags"], json!(["a", "b"]));
  }

  #[test]
  fn source_parts_round_trip() {
    let id = Uuid::new_v4();
    for source in [
      TransitionSource::ScanEvent(id),
      TransitionSource::ManualAction(id),
      TransitionSource::SystemTimer,
    ] {
      assert_eq!(
        TransitionSource::from_parts(source.source_type(), source.source_id()),
        Some(source)
      );
    }
  }
}
