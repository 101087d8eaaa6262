//! Participants — the registered runners whose tags the readers report.
//!
//! A participant is created once through registration and never mutated
//! afterwards. Its id is assigned by the store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque numeric participant identity, assigned by the registry.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub i64);

impl fmt::Display for ParticipantId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

// ─── Participant ─────────────────────────────────────────────────────────────

/// A registered participant as persisted by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
  pub participant_id: ParticipantId,
  pub name:           String,
  pub age:            i64,
  pub gender:         String,
  /// `None` means no tag has been assigned yet.
  pub rfid_tag:       Option<String>,
  /// Server-assigned; never changes after creation.
  pub registered_at:  DateTime<Utc>,
}

// ─── NewParticipant ──────────────────────────────────────────────────────────

/// Input to [`crate::store::ParticipantRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
  pub name:     String,
  pub age:      i64,
  pub gender:   String,
  pub rfid_tag: Option<String>,
}

impl NewParticipant {
  pub fn new(
    name: impl Into<String>,
    age: i64,
    gender: impl Into<String>,
    rfid_tag: Option<String>,
  ) -> Self {
    Self {
      name: name.into(),
      age,
      gender: gender.into(),
      rfid_tag,
    }
  }

  /// Reject registrations with an empty name, a non-positive age, or an
  /// empty gender. A name or gender of only whitespace counts as empty.
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::Validation("name must not be empty".into()));
    }
    if self.age <= 0 {
      return Err(Error::Validation(format!(
        "age must be positive, got {}",
        self.age
      )));
    }
    if self.gender.trim().is_empty() {
      return Err(Error::Validation("gender must not be empty".into()));
    }
    Ok(())
  }

  /// The tag as it should be stored, in the same form readers report it
  /// (see [`normalize_tag`]). Blank tags count as "not assigned", so any
  /// number of participants may share them.
  pub fn normalized_tag(&self) -> Option<&str> {
    self.rfid_tag.as_deref().and_then(normalize_tag)
  }
}

/// Canonical form of a tag: surrounding whitespace and control characters
/// stripped, case and inner characters untouched. `None` if nothing is left.
///
/// Registration and ingestion both go through this, so a stored tag always
/// matches the frame a reader sends for it.
pub fn normalize_tag(raw: &str) -> Option<&str> {
  let tag = raw.trim_matches(|c: char| c.is_whitespace() || c.is_control());
  (!tag.is_empty()).then_some(tag)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn valid_registration_passes() {
    let p = NewParticipant::new("Ada", 30, "F", Some("TAG1".into()));
    assert!(p.validate().is_ok());
  }

  #[test]
  fn empty_name_is_rejected() {
    let p = NewParticipant::new("  ", 30, "F", None);
    assert!(matches!(p.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn non_positive_age_is_rejected() {
    for age in [0, -4] {
      let p = NewParticipant::new("Ada", age, "F", None);
      assert!(matches!(p.validate(), Err(Error::Validation(_))), "age {age}");
    }
  }

  #[test]
  fn empty_gender_is_rejected() {
    let p = NewParticipant::new("Ada", 30, "", None);
    assert!(matches!(p.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn blank_tag_normalizes_to_none() {
    let blank = NewParticipant::new("Ada", 30, "F", Some("   ".into()));
    assert_eq!(blank.normalized_tag(), None);

    let absent = NewParticipant::new("Ada", 30, "F", None);
    assert_eq!(absent.normalized_tag(), None);

    // Case is kept.
    let tagged = NewParticipant::new("Ada", 30, "F", Some("tag1".into()));
    assert_eq!(tagged.normalized_tag(), Some("tag1"));
  }

  #[test]
  fn padded_tag_is_trimmed() {
    let padded = NewParticipant::new("Ada", 30, "F", Some(" TAG1\r\n".into()));
    assert_eq!(padded.normalized_tag(), Some("TAG1"));
    assert_eq!(normalize_tag("\0Tag 1a\t"), Some("Tag 1a"));
    assert_eq!(normalize_tag(" \0 "), None);
  }
}
