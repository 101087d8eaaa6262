//! [`SqliteStore`] — the SQLite implementation of [`ParticipantRegistry`] and
//! [`EventStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
  },
};

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;

use racetrack_core::{
  event::{EventId, RaceEvent},
  participant::{NewParticipant, Participant, ParticipantId},
  store::{EventStore, ParticipantRegistry},
};

use crate::{
  Error, Result,
  encode::{RawEvent, RawParticipant, decode_dt, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A participant registry and event log backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection and clock are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  /// Microseconds since the epoch of the newest `recorded_at` handed out.
  clock: Arc<AtomicI64>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let latest: Option<String> = conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        let latest = conn.query_row(
          "SELECT MAX(recorded_at) FROM race_events",
          [],
          |r| r.get(0),
        )?;
        Ok(latest)
      })
      .await?;

    // Resume the clock from the newest persisted event so timestamps stay
    // non-decreasing across restarts, even if the wall clock moved back.
    let seed = latest
      .as_deref()
      .map(decode_dt)
      .transpose()?
      .map_or(i64::MIN, |dt| dt.timestamp_micros());

    Ok(Self {
      conn,
      clock: Arc::new(AtomicI64::new(seed)),
    })
  }
}

/// Next event timestamp: the wall clock, never earlier than the last one
/// issued. Called inside the connection thread, so issue order equals
/// insertion order.
fn next_timestamp(clock: &AtomicI64) -> DateTime<Utc> {
  let now = Utc::now().timestamp_micros();
  let prev = clock.fetch_max(now, Ordering::SeqCst);
  DateTime::from_timestamp_micros(prev.max(now)).unwrap_or_else(Utc::now)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── ParticipantRegistry impl ────────────────────────────────────────────────

impl ParticipantRegistry for SqliteStore {
  type Error = Error;

  async fn register(&self, input: NewParticipant) -> Result<Participant> {
    input.validate()?;

    let rfid_tag      = input.normalized_tag().map(str::to_owned);
    let registered_at = Utc::now().trunc_subsecs(6);
    let at_str        = encode_dt(registered_at);
    let name          = input.name.clone();
    let gender        = input.gender.clone();
    let age           = input.age;
    let tag           = rfid_tag.clone();

    let inserted: Option<i64> = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO participants (name, age, gender, rfid_tag, registered_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![name, age, gender, tag, at_str],
        );
        match res {
          Ok(_) => Ok(Some(conn.last_insert_rowid())),
          Err(e) if is_unique_violation(&e) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    let Some(id) = inserted else {
      let tag = rfid_tag.unwrap_or_default();
      tracing::debug!(%tag, "rejected registration with duplicate tag");
      return Err(racetrack_core::Error::DuplicateTag(tag).into());
    };

    tracing::debug!(participant_id = id, "registered participant");
    Ok(Participant {
      participant_id: ParticipantId(id),
      name: input.name,
      age: input.age,
      gender: input.gender,
      rfid_tag,
      registered_at,
    })
  }

  async fn find_by_tag(&self, tag: &str) -> Result<Option<ParticipantId>> {
    let tag = tag.to_owned();

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT participant_id FROM participants WHERE rfid_tag = ?1",
              rusqlite::params![tag],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(id.map(ParticipantId))
  }

  async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>> {
    let raw: Option<RawParticipant> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM participants WHERE participant_id = ?1",
          RawParticipant::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id.0], RawParticipant::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawParticipant::into_participant).transpose()
  }

  async fn list_participants(&self) -> Result<Vec<Participant>> {
    let raws: Vec<RawParticipant> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM participants ORDER BY participant_id",
          RawParticipant::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawParticipant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawParticipant::into_participant).collect()
  }
}

// ─── EventStore impl ─────────────────────────────────────────────────────────

impl EventStore for SqliteStore {
  type Error = Error;

  async fn append(
    &self,
    participant_id: ParticipantId,
    event_type: &str,
  ) -> Result<RaceEvent> {
    let event_type = event_type.to_owned();
    let clock      = Arc::clone(&self.clock);

    let event = self
      .conn
      .call(move |conn| {
        let recorded_at = next_timestamp(&clock);
        conn.execute(
          "INSERT INTO race_events (participant_id, event_type, recorded_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![participant_id.0, event_type, encode_dt(recorded_at)],
        )?;
        Ok(RaceEvent {
          event_id: EventId(conn.last_insert_rowid()),
          participant_id,
          event_type,
          recorded_at,
        })
      })
      .await?;

    Ok(event)
  }

  async fn list_by_participant(
    &self,
    participant_id: ParticipantId,
  ) -> Result<Vec<RaceEvent>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, participant_id, event_type, recorded_at
           FROM race_events
           WHERE participant_id = ?1
           ORDER BY recorded_at ASC, event_id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![participant_id.0], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}
