//! Read-only inspection of participants and their recorded events.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/participants` | All participants, by id |
//! | `GET`  | `/participants/{id}` | 404 if not found |
//! | `GET`  | `/participants/{id}/events` | Oldest first; 404 if the participant is unknown |

use axum::{
  Json,
  extract::{Path, State},
};
use racetrack_core::{
  event::RaceEvent,
  participant::{Participant, ParticipantId},
  store::{EventStore, ParticipantRegistry},
};

use crate::{ApiState, error::ApiError};

/// `GET /participants`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Participant>>, ApiError>
where
  S: ParticipantRegistry + EventStore + 'static,
{
  let participants = state
    .store
    .list_participants()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(participants))
}

/// `GET /participants/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<ParticipantId>,
) -> Result<Json<Participant>, ApiError>
where
  S: ParticipantRegistry + EventStore + 'static,
{
  let participant = state
    .store
    .get_participant(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("participant {id} not found")))?;
  Ok(Json(participant))
}

/// `GET /participants/{id}/events`
pub async fn events<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<ParticipantId>,
) -> Result<Json<Vec<RaceEvent>>, ApiError>
where
  S: ParticipantRegistry + EventStore + 'static,
{
  state
    .store
    .get_participant(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("participant {id} not found")))?;

  let events = state
    .store
    .list_by_participant(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(events))
}
