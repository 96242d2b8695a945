//! [`SqliteStore`] — the SQLite implementation of [`ShipmentStore`].
//!
//! Every mutating operation runs inside one `BEGIN IMMEDIATE` transaction on
//! the connection thread. Domain errors raised half-way drop the
//! transaction, which rolls back everything written so far.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{
  Connection, OptionalExtension as _, Transaction, TransactionBehavior,
  params_from_iter, types::Value,
};
use uuid::Uuid;

use courier_core::{
  context::TransitionContext,
  lifecycle::{self, ShipmentTransition},
  reactor::{
    Channel, Invoice, InvoiceLedger, Notification, NotificationPreference,
    NotificationStore,
  },
  scan::{BagLookup, ScanEvent, ScanSubmission, ShipmentLookup},
  shipment::{Bag, NewShipment, Parcel, Shipment},
  signal::StatusChanged,
  status::Status,
  store::{Committed, ScanRecorded, ShipmentStore},
};

use crate::{
  Error, Result,
  encode::{
    RawBag, RawInvoice, RawParcel, RawScanEvent, RawShipment, RawTransition,
    SCAN_COLUMNS, SHIPMENT_COLUMNS, TRANSITION_COLUMNS, decode_uuid,
    encode_dt, encode_json, encode_scan_event, encode_shipment,
    encode_transition, encode_uuid,
  },
  error::unique_violation,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A courier shipment store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Parcels attached to a shipment, in registration order.
  pub async fn parcels(&self, shipment_id: Uuid) -> Result<Vec<Parcel>> {
    let id_str = encode_uuid(shipment_id);

    let raws: Vec<RawParcel> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT parcel_id, shipment_id, sscc, created_at
           FROM parcels WHERE shipment_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawParcel {
              parcel_id:   row.get(0)?,
              shipment_id: row.get(1)?,
              sscc:        row.get(2)?,
              created_at:  row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawParcel::into_parcel).collect()
  }

  /// Look a bag up by its printed code.
  pub async fn find_bag(&self, code: &str) -> Result<Option<Bag>> {
    let code = code.to_owned();

    let raw: Option<RawBag> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT bag_id, code, created_at FROM bags WHERE code = ?1",
              rusqlite::params![code],
              |row| {
                Ok(RawBag {
                  bag_id:     row.get(0)?,
                  code:       row.get(1)?,
                  created_at: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawBag::into_bag).transpose()
  }

  /// Store a customer's notification preference, replacing any previous one.
  pub async fn set_preference(
    &self,
    customer_id: Uuid,
    preference: NotificationPreference,
  ) -> Result<()> {
    let id_str = encode_uuid(customer_id);
    let channel = preference.channel.as_str();
    let opted_out = preference.opted_out;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO customer_preferences (customer_id, channel, opted_out)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (customer_id)
           DO UPDATE SET channel = excluded.channel, opted_out = excluded.opted_out",
          rusqlite::params![id_str, channel, opted_out],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Transaction bodies ──────────────────────────────────────────────────────
//
// These run on the connection thread. Each takes the raw connection, opens
// its own IMMEDIATE transaction and commits only on full success.

fn immediate(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
  conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

fn book_tx(
  conn: &mut Connection,
  input: NewShipment,
  ctx: TransitionContext,
) -> Result<Committed> {
  let tx = immediate(conn)?;
  let now = Utc::now();

  let (shipment, transition) = lifecycle::book(input, &ctx, now)?;
  for (column, value) in [
    ("tracking_number", &shipment.tracking_number),
    ("awb_number", &shipment.awb_number),
  ] {
    if value_taken(&tx, column, value)? {
      return Err(Error::Duplicate { what: column, value: value.clone() });
    }
  }

  insert_shipment(&tx, &shipment)?;
  insert_transition(&tx, &transition)?;
  let signal = StatusChanged::new(shipment.clone(), transition.clone(), None, now);
  insert_signal(&tx, &signal)?;

  tx.commit()?;
  Ok(Committed { shipment, transition, signal })
}

fn transition_tx(
  conn: &mut Connection,
  shipment_id: Uuid,
  target: Status,
  ctx: TransitionContext,
) -> Result<Committed> {
  let tx = immediate(conn)?;
  let now = Utc::now();

  let shipment = load_shipment(&tx, "shipment_id", &encode_uuid(shipment_id))?
    .ok_or(courier_core::Error::ShipmentNotFound(shipment_id))?;
  let committed = apply_and_write(&tx, shipment, target, &ctx, None, now)?;

  tx.commit()?;
  Ok(committed)
}

fn record_scan_tx(
  conn: &mut Connection,
  submission: ScanSubmission,
) -> Result<ScanRecorded> {
  let tx = immediate(conn)?;
  let now = Utc::now();

  let shipment = resolve_shipment(&tx, &submission.shipment)?;
  let bag_id = resolve_bag(&tx, &submission.bag)?;

  let mut scan = ScanEvent::from_submission(
    &submission,
    shipment.as_ref().map(|s| s.shipment_id),
    bag_id,
    now,
  );
  insert_scan_event(&tx, &scan)?;

  let committed = match (shipment, submission.target_status()) {
    (Some(shipment), Some(target)) => {
      let ctx = submission.transition_context(scan.scan_event_id, target);
      scan.status_after = Some(target);
      tx.execute(
        "UPDATE scan_events SET status_after = ?1 WHERE scan_event_id = ?2",
        rusqlite::params![target.as_str(), encode_uuid(scan.scan_event_id)],
      )?;
      Some(apply_and_write(&tx, shipment, target, &ctx, Some(scan.clone()), now)?)
    }
    _ => None,
  };

  tx.commit()?;
  Ok(ScanRecorded { scan_event: scan, committed })
}

fn resolve_exception_tx(conn: &mut Connection, shipment_id: Uuid) -> Result<Shipment> {
  let tx = immediate(conn)?;

  let mut shipment = load_shipment(&tx, "shipment_id", &encode_uuid(shipment_id))?
    .ok_or(courier_core::Error::ShipmentNotFound(shipment_id))?;
  let expected = shipment.lock_version;
  if lifecycle::resolve_exception(&mut shipment, Utc::now()) {
    update_shipment(&tx, &mut shipment, expected)?;
  }

  tx.commit()?;
  Ok(shipment)
}

fn register_parcel_tx(
  conn: &mut Connection,
  shipment_id: Uuid,
  sscc: String,
) -> Result<Parcel> {
  let tx = immediate(conn)?;
  let shipment_str = encode_uuid(shipment_id);
  if !value_taken(&tx, "shipment_id", &shipment_str)? {
    return Err(courier_core::Error::ShipmentNotFound(shipment_id).into());
  }

  let parcel = Parcel {
    parcel_id: Uuid::new_v4(),
    shipment_id,
    sscc,
    created_at: Utc::now(),
  };
  tx.execute(
    "INSERT INTO parcels (parcel_id, shipment_id, sscc, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      encode_uuid(parcel.parcel_id),
      shipment_str,
      parcel.sscc,
      encode_dt(parcel.created_at),
    ],
  )
  .map_err(|e| unique_violation(e, "sscc", &parcel.sscc))?;

  tx.commit()?;
  Ok(parcel)
}

/// Create the shipment's invoice unless one exists. Numbers are sequential.
fn create_invoice_tx(
  conn: &mut Connection,
  shipment_id: Uuid,
  issued_at: DateTime<Utc>,
) -> Result<Invoice> {
  let tx = immediate(conn)?;
  if let Some(existing) = load_invoice(&tx, shipment_id)? {
    return Ok(existing);
  }

  let issued: i64 = tx.query_row("SELECT COUNT(*) FROM invoices", [], |r| r.get(0))?;
  let invoice = Invoice {
    invoice_id: Uuid::new_v4(),
    shipment_id,
    invoice_number: format!("INV-{:08}", issued + 1),
    issued_at,
  };
  tx.execute(
    "INSERT INTO invoices (invoice_id, shipment_id, invoice_number, issued_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      encode_uuid(invoice.invoice_id),
      encode_uuid(shipment_id),
      invoice.invoice_number,
      encode_dt(issued_at),
    ],
  )?;

  tx.commit()?;
  Ok(invoice)
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// Plan `target` on `shipment`, then write the shipment, its audit row and
/// the outbox signal.
fn apply_and_write(
  conn: &Connection,
  mut shipment: Shipment,
  target: Status,
  ctx: &TransitionContext,
  scan: Option<ScanEvent>,
  now: DateTime<Utc>,
) -> Result<Committed> {
  let expected = shipment.lock_version;
  let transition = lifecycle::apply(&mut shipment, target, ctx, now)?;

  update_shipment(conn, &mut shipment, expected)?;
  insert_transition(conn, &transition)?;
  let signal = StatusChanged::new(shipment.clone(), transition.clone(), scan, now);
  insert_signal(conn, &signal)?;

  Ok(Committed { shipment, transition, signal })
}

fn value_taken(conn: &Connection, column: &str, value: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        &format!("SELECT 1 FROM shipments WHERE {column} = ?1"),
        rusqlite::params![value],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

pub(crate) fn load_shipment(conn: &Connection, column: &str, value: &str) -> Result<Option<Shipment>> {
  let sql = format!("SELECT {} FROM shipments WHERE {column} = ?1", *SHIPMENT_COLUMNS);
  conn
    .query_row(&sql, rusqlite::params![value], RawShipment::from_row)
    .optional()?
    .map(RawShipment::into_shipment)
    .transpose()
}

/// Explicit id, then tracking number, then SSCC through the parcel table.
/// A reference that matches nothing falls through to the next one.
fn resolve_shipment(conn: &Connection, lookup: &ShipmentLookup) -> Result<Option<Shipment>> {
  if let Some(id) = lookup.shipment_id
    && let Some(s) = load_shipment(conn, "shipment_id", &encode_uuid(id))?
  {
    return Ok(Some(s));
  }
  if let Some(tn) = &lookup.tracking_number
    && let Some(s) = load_shipment(conn, "tracking_number", tn)?
  {
    return Ok(Some(s));
  }
  if let Some(sscc) = &lookup.sscc {
    let parent: Option<String> = conn
      .query_row(
        "SELECT shipment_id FROM parcels WHERE sscc = ?1",
        rusqlite::params![sscc],
        |r| r.get(0),
      )
      .optional()?;
    if let Some(id) = parent {
      return load_shipment(conn, "shipment_id", &id);
    }
  }
  Ok(None)
}

fn resolve_bag(conn: &Connection, lookup: &BagLookup) -> Result<Option<Uuid>> {
  let found: Option<String> = match (lookup.bag_id, &lookup.code) {
    (Some(id), _) => conn
      .query_row(
        "SELECT bag_id FROM bags WHERE bag_id = ?1",
        rusqlite::params![encode_uuid(id)],
        |r| r.get(0),
      )
      .optional()?,
    (None, Some(code)) => conn
      .query_row(
        "SELECT bag_id FROM bags WHERE code = ?1",
        rusqlite::params![code],
        |r| r.get(0),
      )
      .optional()?,
    (None, None) => None,
  };
  found.as_deref().map(decode_uuid).transpose()
}

fn insert_shipment(conn: &Connection, shipment: &Shipment) -> Result<()> {
  let cols = encode_shipment(shipment);
  let names = cols.iter().map(|(c, _)| *c).collect::<Vec<_>>().join(", ");
  let slots = (1..=cols.len() + 1)
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ");
  let sql = format!("INSERT INTO shipments ({names}, lock_version) VALUES ({slots})");

  let mut values: Vec<Value> = cols.into_iter().map(|(_, v)| v).collect();
  values.push(Value::Integer(shipment.lock_version));
  conn.execute(&sql, params_from_iter(values))?;
  Ok(())
}

/// Write `shipment` back if nobody else has since `expected`, bumping its
/// `lock_version`.
pub(crate) fn update_shipment(conn: &Connection, shipment: &mut Shipment, expected: i64) -> Result<()> {
  let cols: Vec<_> = encode_shipment(shipment)
    .into_iter()
    .filter(|(c, _)| !matches!(*c, "shipment_id" | "created_at"))
    .collect();
  let n = cols.len();
  let assignments = cols
    .iter()
    .enumerate()
    .map(|(i, (c, _))| format!("{c} = ?{}", i + 1))
    .collect::<Vec<_>>()
    .join(", ");
  let sql = format!(
    "UPDATE shipments SET {assignments}, lock_version = lock_version + 1
     WHERE shipment_id = ?{} AND lock_version = ?{}",
    n + 1,
    n + 2,
  );

  let mut values: Vec<Value> = cols.into_iter().map(|(_, v)| v).collect();
  values.push(Value::Text(encode_uuid(shipment.shipment_id)));
  values.push(Value::Integer(expected));
  if conn.execute(&sql, params_from_iter(values))? == 0 {
    return Err(Error::Conflict(shipment.shipment_id));
  }
  shipment.lock_version = expected + 1;
  Ok(())
}

fn insert_transition(conn: &Connection, transition: &ShipmentTransition) -> Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO shipment_transitions ({TRANSITION_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    ),
    params_from_iter(encode_transition(transition)?),
  )?;
  Ok(())
}

fn insert_scan_event(conn: &Connection, scan: &ScanEvent) -> Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO scan_events ({SCAN_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
               ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
    ),
    params_from_iter(encode_scan_event(scan)?),
  )?;
  Ok(())
}

fn insert_signal(conn: &Connection, signal: &StatusChanged) -> Result<()> {
  conn.execute(
    "INSERT INTO status_signals (signal_id, shipment_id, transition_id, payload, emitted_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      encode_uuid(signal.signal_id),
      encode_uuid(signal.shipment.shipment_id),
      encode_uuid(signal.transition.transition_id),
      encode_json(signal)?,
      encode_dt(signal.emitted_at),
    ],
  )?;
  Ok(())
}

fn load_invoice(conn: &Connection, shipment_id: Uuid) -> Result<Option<Invoice>> {
  conn
    .query_row(
      "SELECT invoice_id, shipment_id, invoice_number, issued_at
       FROM invoices WHERE shipment_id = ?1",
      rusqlite::params![encode_uuid(shipment_id)],
      RawInvoice::from_row,
    )
    .optional()?
    .map(RawInvoice::into_invoice)
    .transpose()
}

// ─── ShipmentStore impl ──────────────────────────────────────────────────────

impl ShipmentStore for SqliteStore {
  type Error = Error;

  // ── Shipments ─────────────────────────────────────────────────────────────

  async fn book(&self, input: NewShipment, ctx: TransitionContext) -> Result<Committed> {
    self.conn.call(move |conn| Ok(book_tx(conn, input, ctx))).await?
  }

  async fn get_shipment(&self, id: Uuid) -> Result<Option<Shipment>> {
    let id_str = encode_uuid(id);
    self
      .conn
      .call(move |conn| Ok(load_shipment(conn, "shipment_id", &id_str)))
      .await?
  }

  async fn find_by_tracking_number(&self, tracking_number: &str) -> Result<Option<Shipment>> {
    let tn = tracking_number.to_owned();
    self
      .conn
      .call(move |conn| Ok(load_shipment(conn, "tracking_number", &tn)))
      .await?
  }

  // ── Physical entities ─────────────────────────────────────────────────────

  async fn register_parcel(&self, shipment_id: Uuid, sscc: String) -> Result<Parcel> {
    if sscc.trim().is_empty() {
      return Err(courier_core::Error::InvalidArgument("sscc is empty".into()).into());
    }
    self
      .conn
      .call(move |conn| Ok(register_parcel_tx(conn, shipment_id, sscc)))
      .await?
  }

  async fn register_bag(&self, code: String) -> Result<Bag> {
    if code.trim().is_empty() {
      return Err(courier_core::Error::InvalidArgument("bag code is empty".into()).into());
    }
    let bag = Bag { bag_id: Uuid::new_v4(), code, created_at: Utc::now() };
    let raw = RawBag {
      bag_id:     encode_uuid(bag.bag_id),
      code:       bag.code.clone(),
      created_at: encode_dt(bag.created_at),
    };

    self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .execute(
              "INSERT INTO bags (bag_id, code, created_at) VALUES (?1, ?2, ?3)",
              rusqlite::params![raw.bag_id, raw.code, raw.created_at],
            )
            .map_err(|e| unique_violation(e, "bag code", &raw.code)),
        )
      })
      .await??;

    Ok(bag)
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  async fn transition(
    &self,
    shipment_id: Uuid,
    target: Status,
    ctx: TransitionContext,
  ) -> Result<Committed> {
    self
      .conn
      .call(move |conn| Ok(transition_tx(conn, shipment_id, target, ctx)))
      .await?
  }

  async fn record_scan(&self, scan: ScanSubmission) -> Result<ScanRecorded> {
    self.conn.call(move |conn| Ok(record_scan_tx(conn, scan))).await?
  }

  async fn resolve_exception(&self, shipment_id: Uuid) -> Result<Shipment> {
    self
      .conn
      .call(move |conn| Ok(resolve_exception_tx(conn, shipment_id)))
      .await?
  }

  // ── History ───────────────────────────────────────────────────────────────

  async fn transitions(&self, shipment_id: Uuid) -> Result<Vec<ShipmentTransition>> {
    let id_str = encode_uuid(shipment_id);

    let raws: Vec<RawTransition> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TRANSITION_COLUMNS} FROM shipment_transitions
           WHERE shipment_id = ?1 ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawTransition::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTransition::into_transition).collect()
  }

  async fn scan_events(&self, shipment_id: Uuid) -> Result<Vec<ScanEvent>> {
    let id_str = encode_uuid(shipment_id);

    let raws: Vec<RawScanEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SCAN_COLUMNS} FROM scan_events
           WHERE shipment_id = ?1 ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawScanEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawScanEvent::into_scan_event).collect()
  }

  // ── Outbox ────────────────────────────────────────────────────────────────

  async fn pending_signals(&self, limit: usize) -> Result<Vec<StatusChanged>> {
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let payloads: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT payload FROM status_signals
           WHERE published_at IS NULL ORDER BY rowid LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    payloads
      .iter()
      .map(|p| serde_json::from_str(p).map_err(Error::Json))
      .collect()
  }

  async fn mark_signal_published(&self, signal_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(signal_id);
    let at_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE status_signals SET published_at = ?1
           WHERE signal_id = ?2 AND published_at IS NULL",
          rusqlite::params![at_str, id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      tracing::debug!(%signal_id, "signal already published or unknown");
    }
    Ok(())
  }
}

// ─── InvoiceLedger impl ──────────────────────────────────────────────────────

impl InvoiceLedger for SqliteStore {
  type Error = Error;

  async fn invoice_for(&self, shipment_id: Uuid) -> Result<Option<Invoice>> {
    self
      .conn
      .call(move |conn| Ok(load_invoice(conn, shipment_id)))
      .await?
  }

  async fn create_invoice(
    &self,
    shipment_id: Uuid,
    issued_at: DateTime<Utc>,
  ) -> Result<Invoice> {
    self
      .conn
      .call(move |conn| Ok(create_invoice_tx(conn, shipment_id, issued_at)))
      .await?
  }
}

// ─── NotificationStore impl ──────────────────────────────────────────────────

impl NotificationStore for SqliteStore {
  type Error = Error;

  async fn preference(&self, customer_id: Uuid) -> Result<Option<NotificationPreference>> {
    let id_str = encode_uuid(customer_id);

    let raw: Option<(String, bool)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT channel, opted_out FROM customer_preferences WHERE customer_id = ?1",
              rusqlite::params![id_str],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((channel, opted_out)) = raw else {
      return Ok(None);
    };
    Ok(Some(NotificationPreference { channel: channel.parse::<Channel>()?, opted_out }))
  }

  async fn was_notified(&self, signal_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(signal_id);
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT 1 FROM notifications_sent WHERE signal_id = ?1",
                rusqlite::params![id_str],
                |_| Ok(()),
              )
              .optional()?
              .is_some(),
          )
        })
        .await?,
    )
  }

  async fn mark_notified(&self, notification: Notification) -> Result<()> {
    let signal_str   = encode_uuid(notification.signal_id);
    let customer_str = encode_uuid(notification.customer_id);
    let shipment_str = encode_uuid(notification.shipment_id);
    let channel      = notification.channel.as_str();
    let event        = notification.event;
    let at_str       = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO notifications_sent
             (signal_id, customer_id, event, channel, shipment_id, sent_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![signal_str, customer_str, event, channel, shipment_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
