//! Participant registration: payload validation and outcome mapping.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/register` | Body: [`RegistrationRequest`]; 201 + participant, 400 invalid, 409 duplicate tag |

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use racetrack_core::{
  ErrorKind, StoreError,
  participant::{NewParticipant, Participant},
  store::{EventStore, ParticipantRegistry},
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

// ─── Payload ─────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /register`.
///
/// Every field is optional at the parsing stage so that a missing field is
/// reported as an invalid registration rather than as malformed JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
  pub name:     Option<String>,
  pub age:      Option<i64>,
  pub gender:   Option<String>,
  pub rfid_tag: Option<String>,
}

impl RegistrationRequest {
  pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
    serde_json::from_slice(body)
  }
}

impl From<RegistrationRequest> for NewParticipant {
  fn from(r: RegistrationRequest) -> Self {
    NewParticipant::new(
      r.name.unwrap_or_default(),
      r.age.unwrap_or_default(),
      r.gender.unwrap_or_default(),
      r.rfid_tag,
    )
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// What happened to a registration, in caller-facing terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
  Accepted(Participant),
  Invalid(String),
  /// The tag already belongs to another participant.
  Conflict(String),
  Failed(String),
}

/// Validates registration payloads and writes them to the registry.
pub struct RegistrationService<R> {
  registry: Arc<R>,
}

impl<R> Clone for RegistrationService<R> {
  fn clone(&self) -> Self {
    Self {
      registry: Arc::clone(&self.registry),
    }
  }
}

impl<R: ParticipantRegistry> RegistrationService<R> {
  pub fn new(registry: Arc<R>) -> Self { Self { registry } }

  pub async fn submit(&self, request: RegistrationRequest) -> RegistrationOutcome {
    let input = NewParticipant::from(request);
    if let Err(e) = input.validate() {
      return RegistrationOutcome::Invalid(e.to_string());
    }

    match self.registry.register(input).await {
      Ok(participant) => {
        tracing::info!(
          participant_id = %participant.participant_id,
          rfid_tag = participant.rfid_tag.as_deref().unwrap_or(""),
          "participant registered"
        );
        RegistrationOutcome::Accepted(participant)
      }
      Err(e) => match e.kind() {
        ErrorKind::Validation => RegistrationOutcome::Invalid(e.to_string()),
        ErrorKind::Conflict => RegistrationOutcome::Conflict(e.to_string()),
        ErrorKind::NotFound | ErrorKind::Storage { .. } => {
          RegistrationOutcome::Failed(e.to_string())
        }
      },
    }
  }
}

// ─── Handler ─────────────────────────────────────────────────────────────────

/// `POST /register`
pub async fn handler<S>(
  State(state): State<ApiState<S>>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: ParticipantRegistry + EventStore + 'static,
{
  let request = RegistrationRequest::from_json(&body)
    .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))?;

  match state.registration.submit(request).await {
    RegistrationOutcome::Accepted(p) => Ok((StatusCode::CREATED, Json(p))),
    RegistrationOutcome::Invalid(m) => Err(ApiError::BadRequest(m)),
    RegistrationOutcome::Conflict(m) => Err(ApiError::Conflict(m)),
    RegistrationOutcome::Failed(m) => Err(ApiError::Internal(m)),
  }
}
