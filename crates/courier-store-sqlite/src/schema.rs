//! SQL schema for the courier SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS shipments (
    shipment_id           TEXT PRIMARY KEY,
    tracking_number       TEXT NOT NULL UNIQUE,
    awb_number            TEXT NOT NULL UNIQUE,
    customer_id           TEXT,
    current_status        TEXT NOT NULL,   -- 'BOOKED' | 'PICKED_UP' | ...
    status                TEXT NOT NULL,   -- lowercase mirror of current_status
    location_type         TEXT,            -- 'branch' | 'hub' | 'vehicle'
    location_id           TEXT,

    booked_at             TEXT,
    pickup_scheduled_at   TEXT,
    picked_up_at          TEXT,
    origin_hub_at         TEXT,
    bagged_at             TEXT,
    linehaul_departed_at  TEXT,
    linehaul_arrived_at   TEXT,
    destination_hub_at    TEXT,
    customs_hold_at       TEXT,
    customs_cleared_at    TEXT,
    out_for_delivery_at   TEXT,
    delivered_at          TEXT,
    return_initiated_at   TEXT,
    returned_at           TEXT,
    cancelled_at          TEXT,

    has_exception         INTEGER NOT NULL DEFAULT 0,
    exception_type        TEXT,
    exception_severity    TEXT,
    exception_notes       TEXT,
    exception_occurred_at TEXT,
    return_reason         TEXT,
    return_notes          TEXT,

    last_scan_event_id    TEXT,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL,
    lock_version          INTEGER NOT NULL DEFAULT 0,
    CHECK (status = lower(current_status))
);

CREATE TABLE IF NOT EXISTS parcels (
    parcel_id   TEXT PRIMARY KEY,
    shipment_id TEXT NOT NULL REFERENCES shipments(shipment_id),
    sscc        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bags (
    bag_id     TEXT PRIMARY KEY,
    code       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Transitions are strictly append-only; the triggers below enforce it.
CREATE TABLE IF NOT EXISTS shipment_transitions (
    transition_id TEXT PRIMARY KEY,
    shipment_id   TEXT NOT NULL REFERENCES shipments(shipment_id),
    from_status   TEXT,              -- NULL only for the booking row
    to_status     TEXT NOT NULL,
    trigger_kind  TEXT NOT NULL,     -- 'manual' | 'scan_event' | 'other'
    source_type   TEXT NOT NULL,     -- 'scan_event' | 'manual_action' | 'system_timer'
    source_id     TEXT,
    performed_by  TEXT,
    forced        INTEGER NOT NULL DEFAULT 0,
    context       TEXT NOT NULL,     -- JSON ContextSnapshot
    recorded_at   TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS shipment_transitions_no_update
BEFORE UPDATE ON shipment_transitions
BEGIN
    SELECT RAISE(ABORT, 'shipment_transitions is append-only');
END;

CREATE TRIGGER IF NOT EXISTS shipment_transitions_no_delete
BEFORE DELETE ON shipment_transitions
BEGIN
    SELECT RAISE(ABORT, 'shipment_transitions is append-only');
END;

-- Only status_after is ever written after insert, inside the same
-- transaction that created the row.
CREATE TABLE IF NOT EXISTS scan_events (
    scan_event_id TEXT PRIMARY KEY,
    scan_type     TEXT NOT NULL,
    shipment_id   TEXT REFERENCES shipments(shipment_id),
    bag_id        TEXT REFERENCES bags(bag_id),
    route_id      TEXT,
    stop_id       TEXT,
    leg_id        TEXT,
    branch_id     TEXT,
    user_id       TEXT,
    location_type TEXT,
    location_id   TEXT,
    occurred_at   TEXT NOT NULL,
    geojson       TEXT,              -- JSON or NULL
    note          TEXT,
    payload       TEXT,              -- JSON or NULL
    metadata      TEXT NOT NULL DEFAULT '{}',
    status_after  TEXT,
    recorded_at   TEXT NOT NULL
);

-- Outbox: one row per status-changed signal, written with its transition.
CREATE TABLE IF NOT EXISTS status_signals (
    signal_id     TEXT PRIMARY KEY,
    shipment_id   TEXT NOT NULL REFERENCES shipments(shipment_id),
    transition_id TEXT NOT NULL REFERENCES shipment_transitions(transition_id),
    payload       TEXT NOT NULL,     -- JSON StatusChanged
    emitted_at    TEXT NOT NULL,
    published_at  TEXT
);

CREATE TABLE IF NOT EXISTS invoices (
    invoice_id     TEXT PRIMARY KEY,
    shipment_id    TEXT NOT NULL UNIQUE REFERENCES shipments(shipment_id),
    invoice_number TEXT NOT NULL UNIQUE,
    issued_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS customer_preferences (
    customer_id TEXT PRIMARY KEY,
    channel     TEXT NOT NULL DEFAULT 'email',
    opted_out   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS notifications_sent (
    signal_id   TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    event       TEXT NOT NULL,
    channel     TEXT NOT NULL,
    shipment_id TEXT NOT NULL,
    sent_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS transitions_shipment_idx ON shipment_transitions(shipment_id);
CREATE INDEX IF NOT EXISTS scans_shipment_idx       ON scan_events(shipment_id);
CREATE INDEX IF NOT EXISTS scans_bag_idx            ON scan_events(bag_id);
CREATE INDEX IF NOT EXISTS parcels_shipment_idx     ON parcels(shipment_id);
CREATE INDEX IF NOT EXISTS signals_pending_idx      ON status_signals(published_at);

PRAGMA user_version = 1;
";
