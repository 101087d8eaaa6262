//! Storage traits for participants and race events.
//!
//! Implemented by storage backends (e.g. `racetrack-store-sqlite`). The
//! ingestion and registration layers depend on these abstractions, not on
//! any concrete backend. Each individual call is expected to be atomic; no
//! cross-call transactions are offered.

use std::future::Future;

use crate::{
  error::StoreError,
  event::RaceEvent,
  participant::{NewParticipant, Participant, ParticipantId},
};

// ─── Participants ────────────────────────────────────────────────────────────

/// Durable mapping from RFID tag to participant identity.
///
/// All methods return `Send` futures so implementations can be shared across
/// tokio tasks.
pub trait ParticipantRegistry: Send + Sync {
  type Error: StoreError;

  /// Validate and persist a new participant.
  ///
  /// Fails with a validation error for an empty name, non-positive age or
  /// empty gender, and with a conflict if the (non-blank) tag is already
  /// owned. A failed registration leaves the registry unchanged.
  fn register(
    &self,
    input: NewParticipant,
  ) -> impl Future<Output = Result<Participant, Self::Error>> + Send + '_;

  /// Exact, case-sensitive lookup of the participant owning `tag`.
  fn find_by_tag<'a>(
    &'a self,
    tag: &'a str,
  ) -> impl Future<Output = Result<Option<ParticipantId>, Self::Error>> + Send + 'a;

  /// Retrieve a participant by id. Returns `None` if not found.
  fn get_participant(
    &self,
    id: ParticipantId,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  /// All participants, ordered by id.
  fn list_participants(
    &self,
  ) -> impl Future<Output = Result<Vec<Participant>, Self::Error>> + Send + '_;
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Append-only log of race events.
pub trait EventStore: Send + Sync {
  type Error: StoreError;

  /// Persist a new event with a store-assigned timestamp.
  ///
  /// `event_type` is not validated; any reader-supplied checkpoint name is
  /// accepted.
  fn append<'a>(
    &'a self,
    participant_id: ParticipantId,
    event_type: &'a str,
  ) -> impl Future<Output = Result<RaceEvent, Self::Error>> + Send + 'a;

  /// Every event for `participant_id`, oldest first. Each call runs a fresh
  /// query.
  fn list_by_participant(
    &self,
    participant_id: ParticipantId,
  ) -> impl Future<Output = Result<Vec<RaceEvent>, Self::Error>> + Send + '_;
}
