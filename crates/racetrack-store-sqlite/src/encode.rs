//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width,
//! so lexicographic order in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use racetrack_core::{
  event::{EventId, RaceEvent},
  participant::{Participant, ParticipantId},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `participants` row as read from SQLite, before timestamp decoding.
pub struct RawParticipant {
  pub participant_id: i64,
  pub name:           String,
  pub age:            i64,
  pub gender:         String,
  pub rfid_tag:       Option<String>,
  pub registered_at:  String,
}

impl RawParticipant {
  pub const COLUMNS: &'static str =
    "participant_id, name, age, gender, rfid_tag, registered_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      participant_id: row.get(0)?,
      name:           row.get(1)?,
      age:            row.get(2)?,
      gender:         row.get(3)?,
      rfid_tag:       row.get(4)?,
      registered_at:  row.get(5)?,
    })
  }

  pub fn into_participant(self) -> Result<Participant> {
    Ok(Participant {
      participant_id: ParticipantId(self.participant_id),
      name:           self.name,
      age:            self.age,
      gender:         self.gender,
      rfid_tag:       self.rfid_tag,
      registered_at:  decode_dt(&self.registered_at)?,
    })
  }
}

/// A `race_events` row as read from SQLite.
pub struct RawEvent {
  pub event_id:       i64,
  pub participant_id: i64,
  pub event_type:     String,
  pub recorded_at:    String,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:       row.get(0)?,
      participant_id: row.get(1)?,
      event_type:     row.get(2)?,
      recorded_at:    row.get(3)?,
    })
  }

  pub fn into_event(self) -> Result<RaceEvent> {
    Ok(RaceEvent {
      event_id:       EventId(self.event_id),
      participant_id: ParticipantId(self.participant_id),
      event_type:     self.event_type,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}
