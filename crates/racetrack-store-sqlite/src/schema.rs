//! SQL schema for the Racetrack SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

-- A NULL tag means 'not assigned yet'; UNIQUE ignores NULLs.
CREATE TABLE IF NOT EXISTS participants (
    participant_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name           TEXT    NOT NULL,
    age            INTEGER NOT NULL CHECK (age > 0),
    gender         TEXT    NOT NULL,
    rfid_tag       TEXT    UNIQUE,
    registered_at  TEXT    NOT NULL   -- RFC 3339 UTC; server-assigned
);

-- Strictly append-only. No UPDATE or DELETE is ever issued.
CREATE TABLE IF NOT EXISTS race_events (
    event_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_id INTEGER NOT NULL REFERENCES participants(participant_id),
    event_type     TEXT    NOT NULL,
    recorded_at    TEXT    NOT NULL   -- RFC 3339 UTC, fixed micros width
);

CREATE INDEX IF NOT EXISTS race_events_participant_idx
    ON race_events(participant_id, recorded_at);

PRAGMA user_version = 1;
";
