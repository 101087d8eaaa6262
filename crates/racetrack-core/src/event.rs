//! Race events — the append-only record of tag reads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::participant::ParticipantId;

/// Event type recorded for reader frames unless configured otherwise.
pub const DEFAULT_EVENT_TYPE: &str = "checkpoint";

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// One recorded tag read. Once written, no field is ever updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceEvent {
  pub event_id:       EventId,
  pub participant_id: ParticipantId,
  /// Free-form; readers name their checkpoints however they like.
  pub event_type:     String,
  /// Store-assigned, non-decreasing in insertion order.
  pub recorded_at:    DateTime<Utc>,
}
