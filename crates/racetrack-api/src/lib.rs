//! JSON HTTP API for Racetrack: participant registration and inspection.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`ParticipantRegistry`] and [`EventStore`]. TLS, tracing layers and the
//! listener are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", racetrack_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod participants;
pub mod registration;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use racetrack_core::store::{EventStore, ParticipantRegistry};

pub use error::ApiError;
pub use registration::{RegistrationOutcome, RegistrationRequest, RegistrationService};

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:        Arc<S>,
  pub registration: RegistrationService<S>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:        Arc::clone(&self.store),
      registration: self.registration.clone(),
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ParticipantRegistry + EventStore + 'static,
{
  let state = ApiState {
    registration: RegistrationService::new(Arc::clone(&store)),
    store,
  };

  Router::new()
    .route("/register", post(registration::handler::<S>))
    .route("/participants", get(participants::list::<S>))
    .route("/participants/{id}", get(participants::get_one::<S>))
    .route("/participants/{id}/events", get(participants::events::<S>))
    .with_state(state)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use racetrack_core::participant::Participant;
  use racetrack_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  async fn make_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().await.unwrap())
  }

  async fn send(
    store:  &Arc<SqliteStore>,
    method: &str,
    uri:    &str,
    body:   &str,
  ) -> (StatusCode, Value) {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    let resp = api_router(Arc::clone(store)).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
  }

  async fn register(store: &Arc<SqliteStore>, body: Value) -> (StatusCode, Value) {
    send(store, "POST", "/register", &body.to_string()).await
  }

  // ── Registration ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn register_returns_201_with_participant() {
    let store = make_store().await;
    let (status, body) = register(
      &store,
      json!({"name": "Ada", "age": 30, "gender": "F", "rfidTag": "TAG1"}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let p: Participant = serde_json::from_value(body).unwrap();
    assert_eq!(p.name, "Ada");
    assert_eq!(p.rfid_tag.as_deref(), Some("TAG1"));
  }

  #[tokio::test]
  async fn tag_is_optional() {
    let store = make_store().await;
    for name in ["Ada", "Bob"] {
      let (status, _) =
        register(&store, json!({"name": name, "age": 30, "gender": "F"})).await;
      assert_eq!(status, StatusCode::CREATED);
    }
    assert_eq!(store.list_participants().await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn missing_or_invalid_fields_return_400() {
    let store = make_store().await;
    for body in [
      json!({"age": 30, "gender": "F"}),
      json!({"name": "", "age": 30, "gender": "F"}),
      json!({"name": "Ada", "gender": "F"}),
      json!({"name": "Ada", "age": 0, "gender": "F"}),
      json!({"name": "Ada", "age": -3, "gender": "F"}),
      json!({"name": "Ada", "age": 30}),
    ] {
      let (status, resp) = register(&store, body.clone()).await;
      assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
      assert!(resp["error"].is_string());
    }
    assert!(store.list_participants().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn malformed_json_returns_400() {
    let store = make_store().await;
    let (status, resp) = send(&store, "POST", "/register", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(resp["error"].as_str().unwrap().contains("invalid JSON"));

    let (status, _) =
      register(&store, json!({"name": "Ada", "age": "thirty", "gender": "F"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn duplicate_tag_returns_409_and_keeps_count() {
    let store = make_store().await;
    register(
      &store,
      json!({"name": "Ada", "age": 30, "gender": "F", "rfidTag": "TAG1"}),
    )
    .await;

    let (status, resp) = register(
      &store,
      json!({"name": "Bob", "age": 41, "gender": "M", "rfidTag": "TAG1"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(resp["error"].as_str().unwrap().contains("TAG1"));

    let all = store.list_participants().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Ada");
  }

  #[tokio::test]
  async fn service_maps_outcomes() {
    let store = make_store().await;
    let service = RegistrationService::new(Arc::clone(&store));

    let ada = RegistrationRequest {
      name:     Some("Ada".into()),
      age:      Some(30),
      gender:   Some("F".into()),
      rfid_tag: Some("TAG1".into()),
    };
    assert!(matches!(
      service.submit(ada.clone()).await,
      RegistrationOutcome::Accepted(_)
    ));
    assert!(matches!(
      service.submit(ada).await,
      RegistrationOutcome::Conflict(_)
    ));
    assert!(matches!(
      service.submit(RegistrationRequest::default()).await,
      RegistrationOutcome::Invalid(_)
    ));
  }

  // ── Inspection ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn get_participant_and_events() {
    let store = make_store().await;
    let (_, body) = register(
      &store,
      json!({"name": "Ada", "age": 30, "gender": "F", "rfidTag": "TAG1"}),
    )
    .await;
    let p: Participant = serde_json::from_value(body).unwrap();
    store.append(p.participant_id, "checkpoint").await.unwrap();

    let uri = format!("/participants/{}", p.participant_id);
    let (status, fetched) = send(&store, "GET", &uri, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Ada");

    let (status, events) = send(&store, "GET", &format!("{uri}/events"), "").await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], "checkpoint");
    assert_eq!(events[0]["participant_id"], p.participant_id.0);
  }

  #[tokio::test]
  async fn list_participants_in_id_order() {
    let store = make_store().await;
    for name in ["Ada", "Bob", "Cy"] {
      register(&store, json!({"name": name, "age": 30, "gender": "F"})).await;
    }
    let (status, body) = send(&store, "GET", "/participants", "").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body
      .as_array()
      .unwrap()
      .iter()
      .map(|p| p["name"].as_str().unwrap().to_owned())
      .collect();
    assert_eq!(names, ["Ada", "Bob", "Cy"]);
  }

  #[tokio::test]
  async fn unknown_participant_returns_404() {
    let store = make_store().await;
    let (status, _) = send(&store, "GET", "/participants/77", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&store, "GET", "/participants/77/events", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
