//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::{TimeZone as _, Utc};
use courier_core::{
  AsCoreError as _,
  context::{EntityRef, TransitionContext, TransitionSource, Trigger},
  engine::LifecycleEngine,
  reactor::{
    Channel, InvoiceLedger as _, InvoiceReactor, NotificationPreference,
    NotificationStore as _,
  },
  scan::ScanAttributes,
  shipment::{ExceptionDetails, ExceptionSeverity, NewShipment, Shipment},
  signal::{self, Reactor, ReactorWorker, SignalReceiver},
  status::Status,
  store::ShipmentStore,
};
use uuid::Uuid;

use crate::{
  Error, SqliteStore,
  encode::encode_uuid,
  store::{load_shipment, update_shipment},
};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn engine(s: &SqliteStore) -> (LifecycleEngine<SqliteStore>, SignalReceiver) {
  let (tx, rx) = signal::channel();
  (LifecycleEngine::new(Arc::new(s.clone()), tx), rx)
}

async fn book(s: &SqliteStore, tracking: &str) -> Shipment {
  s.book(NewShipment::new(tracking, format!("AWB-{tracking}")), TransitionContext::default())
    .await
    .unwrap()
    .shipment
}

/// Book a shipment and force it straight into `status`.
async fn shipment_in(s: &SqliteStore, tracking: &str, status: Status) -> Shipment {
  let shipment = book(s, tracking).await;
  if status == Status::Booked {
    return shipment;
  }
  let ctx = TransitionContext { force: true, ..Default::default() };
  s.transition(shipment.shipment_id, status, ctx).await.unwrap().shipment
}

fn is_illegal(err: &Error) -> bool {
  matches!(err, Error::Core(courier_core::Error::IllegalTransition { .. }))
}

// ─── Booking ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn book_starts_in_booked_with_first_transition() {
  let s = store().await;
  let shipment = book(&s, "TRK-1").await;

  assert_eq!(shipment.current_status, Status::Booked);
  assert_eq!(shipment.status(), "booked");
  assert!(shipment.milestones.booked_at.is_some());

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(fetched, shipment);

  let history = s.transitions(shipment.shipment_id).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].from_status, None);
  assert_eq!(history[0].to_status, Status::Booked);
}

#[tokio::test]
async fn find_by_tracking_number() {
  let s = store().await;
  let shipment = book(&s, "TRK-FIND").await;

  let found = s.find_by_tracking_number("TRK-FIND").await.unwrap().unwrap();
  assert_eq!(found.shipment_id, shipment.shipment_id);
  assert!(s.find_by_tracking_number("TRK-NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_tracking_number_is_rejected() {
  let s = store().await;
  book(&s, "TRK-DUP").await;

  let err = s
    .book(NewShipment::new("TRK-DUP", "AWB-OTHER"), TransitionContext::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate { what: "tracking_number", .. }));
  assert!(err.is_conflict());
}

#[tokio::test]
async fn blank_tracking_number_is_rejected() {
  let s = store().await;
  let err = s
    .book(NewShipment::new("  ", "AWB-1"), TransitionContext::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(courier_core::Error::InvalidArgument(_))));
}

// ─── Transitions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_transition_is_idempotent_and_stamps_once() {
  let s = store().await;
  let shipment = book(&s, "TRK-IDEM").await;
  let first_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
  let second_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();

  let ctx = |at| TransitionContext { timestamp: Some(at), ..Default::default() };
  s.transition(shipment.shipment_id, Status::PickedUp, ctx(first_at)).await.unwrap();
  let again = s
    .transition(shipment.shipment_id, Status::PickedUp, ctx(second_at))
    .await
    .unwrap();

  assert_eq!(again.transition.from_status, Some(Status::PickedUp));
  assert_eq!(again.transition.to_status, Status::PickedUp);
  assert_eq!(again.shipment.milestones.picked_up_at, Some(first_at));

  let history = s.transitions(shipment.shipment_id).await.unwrap();
  assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn overwrite_timestamp_restamps_milestone() {
  let s = store().await;
  let shipment = book(&s, "TRK-OVR").await;
  let first_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
  let second_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

  let ctx = TransitionContext { timestamp: Some(first_at), ..Default::default() };
  s.transition(shipment.shipment_id, Status::PickedUp, ctx).await.unwrap();

  let ctx = TransitionContext {
    timestamp: Some(second_at),
    overwrite_timestamp: true,
    ..Default::default()
  };
  let committed = s
    .transition(shipment.shipment_id, Status::PickedUp, ctx)
    .await
    .unwrap();
  assert_eq!(committed.shipment.milestones.picked_up_at, Some(second_at));
}

#[tokio::test]
async fn illegal_transition_leaves_shipment_untouched() {
  let s = store().await;
  let shipment = book(&s, "TRK-ILL").await;

  let err = s
    .transition(shipment.shipment_id, Status::Delivered, TransitionContext::default())
    .await
    .unwrap_err();
  assert!(is_illegal(&err));

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(fetched.current_status, Status::Booked);
  assert_eq!(fetched.lock_version, shipment.lock_version);
  assert_eq!(s.transitions(shipment.shipment_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn forced_transition_bypasses_table() {
  let s = store().await;
  let shipment = book(&s, "TRK-FORCE").await;
  let actor = Uuid::new_v4();

  let ctx = TransitionContext { force: true, ..TransitionContext::by(actor) };
  let committed = s
    .transition(shipment.shipment_id, Status::Delivered, ctx)
    .await
    .unwrap();

  assert_eq!(committed.shipment.current_status, Status::Delivered);
  assert!(committed.transition.forced);
  assert_eq!(committed.transition.trigger, Trigger::Manual);
  assert_eq!(committed.transition.source, TransitionSource::ManualAction(actor));
  assert_eq!(
    committed.transition.context.performed_by,
    Some(EntityRef::new("user", actor))
  );
}

#[tokio::test]
async fn terminal_shipment_refuses_to_move() {
  let s = store().await;
  let shipment = shipment_in(&s, "TRK-TERM", Status::Cancelled).await;

  let err = s
    .transition(shipment.shipment_id, Status::Booked, TransitionContext::default())
    .await
    .unwrap_err();
  assert!(is_illegal(&err));
}

#[tokio::test]
async fn transition_of_unknown_shipment_is_not_found() {
  let s = store().await;
  let err = s
    .transition(Uuid::new_v4(), Status::PickedUp, TransitionContext::default())
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn lock_version_advances_on_every_write() {
  let s = store().await;
  let shipment = book(&s, "TRK-LOCK").await;
  assert_eq!(shipment.lock_version, 0);

  let committed = s
    .transition(shipment.shipment_id, Status::PickupScheduled, TransitionContext::default())
    .await
    .unwrap();
  assert_eq!(committed.shipment.lock_version, 1);

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(fetched.lock_version, 1);
}

// ─── Exceptions ──────────────────────────────────────────────────────────────

fn damaged() -> TransitionContext {
  TransitionContext {
    exception: Some(ExceptionDetails {
      exception_type: "damaged".into(),
      severity:       ExceptionSeverity::High,
      notes:          Some("box crushed".into()),
    }),
    ..Default::default()
  }
}

#[tokio::test]
async fn exception_entry_keeps_shipment_recoverable() {
  let s = store().await;
  let shipment = shipment_in(&s, "TRK-EXC", Status::OutForDelivery).await;

  let committed = s
    .transition(shipment.shipment_id, Status::Exception, damaged())
    .await
    .unwrap();
  let exc = &committed.shipment.exception;
  assert!(exc.has_exception);
  assert!(exc.occurred_at.is_some());
  let details = exc.details.as_ref().unwrap();
  assert_eq!(details.exception_type, "damaged");
  assert_eq!(details.severity, ExceptionSeverity::High);
  assert!(!Status::Exception.is_terminal());

  let committed = s
    .transition(shipment.shipment_id, Status::ReturnInitiated, TransitionContext::default())
    .await
    .unwrap();
  assert_eq!(committed.shipment.current_status, Status::ReturnInitiated);
  assert!(committed.shipment.exception.has_exception);
}

#[tokio::test]
async fn exception_without_details_is_rejected() {
  let s = store().await;
  let shipment = shipment_in(&s, "TRK-EXC2", Status::OutForDelivery).await;

  let err = s
    .transition(shipment.shipment_id, Status::Exception, TransitionContext::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(courier_core::Error::MissingExceptionDetails)));

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(fetched.current_status, Status::OutForDelivery);
}

#[tokio::test]
async fn resolve_exception_clears_flag_and_details() {
  let s = store().await;
  let shipment = shipment_in(&s, "TRK-RES", Status::OutForDelivery).await;
  s.transition(shipment.shipment_id, Status::Exception, damaged()).await.unwrap();
  let before = s.transitions(shipment.shipment_id).await.unwrap().len();

  let resolved = s.resolve_exception(shipment.shipment_id).await.unwrap();
  assert!(!resolved.exception.has_exception);
  assert!(resolved.exception.details.is_none());
  assert_eq!(resolved.current_status, Status::Exception);

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(fetched, resolved);
  assert_eq!(s.transitions(shipment.shipment_id).await.unwrap().len(), before);
}

// ─── Atomicity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_audit_write_rolls_back_shipment() {
  let s = store().await;
  let shipment = book(&s, "TRK-ATOM").await;

  s.conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER fail_audit BEFORE INSERT ON shipment_transitions
         BEGIN SELECT RAISE(ABORT, 'audit write failed'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let err = s
    .transition(shipment.shipment_id, Status::PickedUp, TransitionContext::default())
    .await;
  assert!(err.is_err());

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(fetched.current_status, Status::Booked);
  assert!(fetched.milestones.picked_up_at.is_none());
  assert_eq!(fetched.lock_version, 0);
  assert_eq!(s.pending_signals(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn transition_history_is_append_only() {
  let s = store().await;
  let shipment = book(&s, "TRK-APP").await;
  let id = shipment.shipment_id.hyphenated().to_string();

  let result = s
    .conn
    .call(move |conn| {
      conn.execute(
        "UPDATE shipment_transitions SET to_status = 'DELIVERED' WHERE shipment_id = ?1",
        rusqlite::params![id],
      )?;
      Ok(())
    })
    .await;
  assert!(result.is_err());
}

// ─── Scan ingestion ──────────────────────────────────────────────────────────

#[tokio::test]
async fn picked_up_scan_moves_shipment() {
  let s = store().await;
  let (engine, _rx) = engine(&s);
  let shipment = book(&s, "TRK-SCAN").await;
  let occurred_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();

  let attrs = ScanAttributes {
    shipment_id: Some(shipment.shipment_id),
    occurred_at: Some(occurred_at),
    ..ScanAttributes::new("picked_up")
  };
  let scan = engine.record(attrs, None).await.unwrap();
  assert_eq!(scan.status_after, Some(Status::PickedUp));
  assert_eq!(scan.shipment_id, Some(shipment.shipment_id));

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(fetched.current_status, Status::PickedUp);
  assert_eq!(fetched.milestones.picked_up_at, Some(occurred_at));
  assert_eq!(fetched.last_scan_event_id, Some(scan.scan_event_id));

  let stored = s.scan_events(shipment.shipment_id).await.unwrap();
  assert_eq!(stored, vec![scan.clone()]);

  let history = s.transitions(shipment.shipment_id).await.unwrap();
  let last = history.last().unwrap();
  assert_eq!(last.trigger, Trigger::ScanEvent);
  assert_eq!(last.source, TransitionSource::ScanEvent(scan.scan_event_id));
  assert_eq!(
    last.context.scan_event,
    Some(EntityRef::new("scan_event", scan.scan_event_id))
  );
}

#[tokio::test]
async fn scan_resolves_shipment_by_tracking_number_and_sscc() {
  let s = store().await;
  let (engine, _rx) = engine(&s);
  let by_tracking = book(&s, "TRK-T").await;
  let by_sscc = book(&s, "TRK-S").await;
  s.register_parcel(by_sscc.shipment_id, "00340123450000000017".into())
    .await
    .unwrap();

  let scan = engine
    .record(
      ScanAttributes {
        tracking_number: Some("TRK-T".into()),
        ..ScanAttributes::new("pickup_scheduled")
      },
      None,
    )
    .await
    .unwrap();
  assert_eq!(scan.shipment_id, Some(by_tracking.shipment_id));

  let scan = engine
    .record(
      ScanAttributes {
        shipment_id: Some(Uuid::new_v4()),
        sscc: Some("00340123450000000017".into()),
        ..ScanAttributes::new("picked_up")
      },
      None,
    )
    .await
    .unwrap();
  assert_eq!(scan.shipment_id, Some(by_sscc.shipment_id));
  assert_eq!(scan.status_after, Some(Status::PickedUp));
}

#[tokio::test]
async fn bag_only_scan_is_stored_without_transition() {
  let s = store().await;
  let (engine, _rx) = engine(&s);
  let bag = s.register_bag("BAG-001".into()).await.unwrap();

  let scan = engine
    .record(
      ScanAttributes {
        bag_code: Some("BAG-001".into()),
        ..ScanAttributes::new("bag_sealed")
      },
      None,
    )
    .await
    .unwrap();
  assert_eq!(scan.bag_id, Some(bag.bag_id));
  assert_eq!(scan.shipment_id, None);
  assert_eq!(scan.status_after, None);
  assert!(s.pending_signals(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn checkpoint_scan_leaves_status_alone() {
  let s = store().await;
  let (engine, _rx) = engine(&s);
  let shipment = book(&s, "TRK-CHK").await;

  let scan = engine
    .record(
      ScanAttributes {
        shipment_id: Some(shipment.shipment_id),
        ..ScanAttributes::new("checkpoint")
      },
      None,
    )
    .await
    .unwrap();
  assert_eq!(scan.status_after, None);
  assert_eq!(scan.shipment_id, Some(shipment.shipment_id));

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(fetched, shipment);
}

#[tokio::test]
async fn unknown_scan_type_writes_nothing() {
  let s = store().await;
  let (engine, _rx) = engine(&s);
  let shipment = book(&s, "TRK-UNK").await;

  let err = engine
    .record(
      ScanAttributes {
        shipment_id: Some(shipment.shipment_id),
        ..ScanAttributes::new("teleported")
      },
      None,
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(courier_core::Error::UnknownScanType(_))));
  assert!(s.scan_events(shipment.shipment_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn scan_with_illegal_status_is_not_persisted() {
  let s = store().await;
  let (engine, _rx) = engine(&s);
  let shipment = book(&s, "TRK-BAD").await;

  let err = engine
    .record(
      ScanAttributes {
        shipment_id: Some(shipment.shipment_id),
        ..ScanAttributes::new("delivered")
      },
      None,
    )
    .await
    .unwrap_err();
  assert!(is_illegal(&err));
  assert!(s.scan_events(shipment.shipment_id).await.unwrap().is_empty());

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(fetched.current_status, Status::Booked);
}

#[tokio::test]
async fn delivery_failed_scan_raises_exception_with_defaults() {
  let s = store().await;
  let (engine, _rx) = engine(&s);
  let shipment = shipment_in(&s, "TRK-DF", Status::OutForDelivery).await;

  let scan = engine
    .record(
      ScanAttributes {
        tracking_number: Some("TRK-DF".into()),
        note: Some("nobody home".into()),
        ..ScanAttributes::new("delivery_failed")
      },
      None,
    )
    .await
    .unwrap();
  assert_eq!(scan.status_after, Some(Status::Exception));

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  let details = fetched.exception.details.unwrap();
  assert_eq!(details.exception_type, "delivery_failed");
  assert_eq!(details.severity, ExceptionSeverity::Medium);
  assert_eq!(details.notes.as_deref(), Some("nobody home"));
}

#[tokio::test]
async fn repeated_delivery_failed_scan_keeps_first_exception() {
  let s = store().await;
  let (engine, _rx) = engine(&s);
  let shipment = shipment_in(&s, "TRK-DF2", Status::OutForDelivery).await;
  let first_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
  let retry_at = Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap();

  for (at, note) in [(first_at, "first"), (retry_at, "retry")] {
    let scan = engine
      .record(
        ScanAttributes {
          shipment_id: Some(shipment.shipment_id),
          occurred_at: Some(at),
          note: Some(note.into()),
          ..ScanAttributes::new("delivery_failed")
        },
        None,
      )
      .await
      .unwrap();
    assert_eq!(scan.status_after, Some(Status::Exception));
  }

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert!(fetched.exception.has_exception);
  assert_eq!(fetched.exception.occurred_at, Some(first_at));
  let details = fetched.exception.details.unwrap();
  assert_eq!(details.notes.as_deref(), Some("first"));
  // Both scans are still on the audit trail.
  assert_eq!(s.transitions(shipment.shipment_id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn stale_lock_version_is_a_conflict() {
  let s = store().await;
  let shipment = shipment_in(&s, "TRK-STALE", Status::PickedUp).await;
  s.transition(shipment.shipment_id, Status::AtOriginHub, TransitionContext::default())
    .await
    .unwrap();

  let id_str = encode_uuid(shipment.shipment_id);
  let mut stale = shipment.clone();
  stale.current_status = Status::Cancelled;
  let expected = stale.lock_version;
  let result = s
    .conn
    .call(move |conn| Ok(update_shipment(conn, &mut stale, expected)))
    .await
    .unwrap();

  let err = result.unwrap_err();
  assert!(matches!(err, Error::Conflict(id) if id == shipment.shipment_id));
  assert!(err.is_conflict());

  let fetched = s
    .conn
    .call(move |conn| Ok(load_shipment(conn, "shipment_id", &id_str)))
    .await
    .unwrap()
    .unwrap()
    .unwrap();
  assert_eq!(fetched.current_status, Status::AtOriginHub);
  assert_eq!(fetched.lock_version, shipment.lock_version + 1);
}

#[tokio::test]
async fn racing_connections_to_one_file_have_one_winner() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("courier.db");
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();
  let (engine_a, _rx_a) = engine(&a);
  let (engine_b, _rx_b) = engine(&b);

  for round in 0..10 {
    let shipment =
      shipment_in(&a, &format!("TRK-FILE-{round}"), Status::OutForDelivery).await;
    let scan = |kind: &str| ScanAttributes {
      shipment_id: Some(shipment.shipment_id),
      ..ScanAttributes::new(kind)
    };
    let (delivered, returned) = tokio::join!(
      engine_a.record(scan("delivered"), None),
      engine_b.record(scan("return_initiated"), None),
    );

    let (winner, loser) = match (delivered, returned) {
      (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
      other => panic!("round {round}: expected exactly one winner, got {other:?}"),
    };
    assert!(is_illegal(&loser), "round {round}: {loser:?}");

    let fetched = b.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
    assert_eq!(Some(fetched.current_status), winner.status_after);
    assert_eq!(b.scan_events(shipment.shipment_id).await.unwrap().len(), 1);
  }
}

#[tokio::test]
async fn concurrent_scans_have_one_winner() {
  let s = store().await;
  let (engine, _rx) = engine(&s);
  let shipment = shipment_in(&s, "TRK-RACE", Status::OutForDelivery).await;

  let scan = |kind: &str| ScanAttributes {
    shipment_id: Some(shipment.shipment_id),
    ..ScanAttributes::new(kind)
  };
  let (delivered, returned) = tokio::join!(
    engine.record(scan("delivered"), None),
    engine.record(scan("return_initiated"), None),
  );

  let (winner, loser) = match (delivered, returned) {
    (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
    other => panic!("expected exactly one winner, got {other:?}"),
  };
  assert!(is_illegal(&loser));

  let fetched = s.get_shipment(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(Some(fetched.current_status), winner.status_after);
  assert_eq!(s.scan_events(shipment.shipment_id).await.unwrap().len(), 1);
}

// ─── Physical entities ───────────────────────────────────────────────────────

#[tokio::test]
async fn parcels_need_a_shipment_and_a_unique_sscc() {
  let s = store().await;
  let shipment = book(&s, "TRK-PARCEL").await;

  let parcel = s
    .register_parcel(shipment.shipment_id, "SSCC-1".into())
    .await
    .unwrap();
  assert_eq!(s.parcels(shipment.shipment_id).await.unwrap(), vec![parcel]);

  let err = s
    .register_parcel(shipment.shipment_id, "SSCC-1".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate { what: "sscc", .. }));

  let err = s
    .register_parcel(Uuid::new_v4(), "SSCC-2".into())
    .await
    .unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn bag_codes_are_unique() {
  let s = store().await;
  s.register_bag("BAG-X".into()).await.unwrap();
  let err = s.register_bag("BAG-X".into()).await.unwrap_err();
  assert!(err.is_conflict());

  let found = s.find_bag("BAG-X").await.unwrap().unwrap();
  assert_eq!(found.code, "BAG-X");
  assert!(s.find_bag("BAG-Y").await.unwrap().is_none());
}

// ─── Outbox & reactors ───────────────────────────────────────────────────────

#[tokio::test]
async fn signals_stay_pending_until_published() {
  let s = store().await;
  let shipment = book(&s, "TRK-OUT").await;
  s.transition(shipment.shipment_id, Status::PickedUp, TransitionContext::default())
    .await
    .unwrap();

  let pending = s.pending_signals(10).await.unwrap();
  assert_eq!(pending.len(), 2);
  assert_eq!(pending[0].transition.to_status, Status::Booked);
  assert_eq!(pending[1].transition.to_status, Status::PickedUp);
  assert_eq!(pending[1].shipment.current_status, Status::PickedUp);

  s.mark_signal_published(pending[0].signal_id).await.unwrap();
  s.mark_signal_published(pending[0].signal_id).await.unwrap();
  let pending = s.pending_signals(10).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].transition.to_status, Status::PickedUp);
}

#[tokio::test]
async fn engine_emits_after_commit_and_relay_requeues() {
  let s = store().await;
  let (engine, mut rx) = engine(&s);

  let shipment = engine
    .book(NewShipment::new("TRK-EMIT", "AWB-EMIT"), None)
    .await
    .unwrap();
  let signal = rx.recv().await.unwrap();
  assert_eq!(signal.shipment.shipment_id, shipment.shipment_id);

  assert_eq!(engine.relay_pending(10).await.unwrap(), 1);
  let again = rx.recv().await.unwrap();
  assert_eq!(again.signal_id, signal.signal_id);
}

#[tokio::test]
async fn delivered_signal_issues_one_invoice() {
  let s = store().await;
  let store = Arc::new(s.clone());
  let reactors: Vec<Arc<dyn Reactor>> =
    vec![Arc::new(InvoiceReactor::new(store.clone()))];
  let worker = ReactorWorker::new(store, reactors);

  let shipment = shipment_in(&s, "TRK-INV", Status::OutForDelivery).await;
  let committed = s
    .transition(shipment.shipment_id, Status::Delivered, TransitionContext::default())
    .await
    .unwrap();

  assert!(worker.handle(&committed.signal).await);
  assert!(worker.handle(&committed.signal).await);

  let invoice = s.invoice_for(shipment.shipment_id).await.unwrap().unwrap();
  assert_eq!(invoice.invoice_number, "INV-00000001");
  let again = s.create_invoice(shipment.shipment_id, Utc::now()).await.unwrap();
  assert_eq!(again, invoice);

  let pending = s.pending_signals(10).await.unwrap();
  assert!(pending.iter().all(|p| p.signal_id != committed.signal.signal_id));
}

#[tokio::test]
async fn notification_preferences_and_log() {
  let s = store().await;
  let customer = Uuid::new_v4();
  assert_eq!(s.preference(customer).await.unwrap(), None);

  let pref = NotificationPreference { channel: Channel::Sms, opted_out: true };
  s.set_preference(customer, pref).await.unwrap();
  assert_eq!(s.preference(customer).await.unwrap(), Some(pref));

  let signal_id = Uuid::new_v4();
  assert!(!s.was_notified(signal_id).await.unwrap());
  s.mark_notified(courier_core::reactor::Notification {
    signal_id,
    customer_id: customer,
    event: "shipment.delivered",
    channel: Channel::Sms,
    shipment_id: Uuid::new_v4(),
    tracking_number: "TRK-N".into(),
    status: Status::Delivered,
  })
  .await
  .unwrap();
  assert!(s.was_notified(signal_id).await.unwrap());
}
