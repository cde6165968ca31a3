//! JSON REST API for code-master maintenance.
//!
//! Exposes an axum [`Router`] backed by any
//! [`commndata_core::store::RecordStore`]. Authentication is the caller's
//! responsibility; the acting user arrives in `X-Remote-User`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`/`POST` | `/categories` | |
//! | `GET`/`PUT`/`DELETE` | `/categories/{id}` | `DELETE?version=` soft-deletes |
//! | `GET`/`POST` | `/codes` | `?codecategory=&code=&as_of=&include_deleted=` |
//! | `GET`/`PUT`/`DELETE` | `/codes/{id}` | |
//! | `GET` | `/codes/{codecategory}/{code}/history` | the validity chain |
//! | `GET` | `/fields/{entity}` | `?editing=true` for an existing row |

pub mod actor;
pub mod categories;
pub mod codes;
pub mod error;
pub mod fields;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use commndata_core::{Error, service::RecordService, store::RecordStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `COMMNDATA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub store_path:    PathBuf,
  /// Acting user for requests without `X-Remote-User`.
  #[serde(default)]
  pub default_actor: Option<String>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: RecordStore> {
  pub service: Arc<RecordService<S>>,
  pub config:  Arc<ServerConfig>,
}

impl<S: RecordStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self {
      service: Arc::new(RecordService::new(Arc::new(store))),
      config:  Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  Router::new()
    // Categories
    .route(
      "/categories",
      get(categories::list::<S>).post(categories::create::<S>),
    )
    .route(
      "/categories/{id}",
      get(categories::get_one::<S>)
        .put(categories::update::<S>)
        .delete(categories::delete::<S>),
    )
    // Codes
    .route("/codes", get(codes::list::<S>).post(codes::create::<S>))
    .route(
      "/codes/{id}",
      get(codes::get_one::<S>)
        .put(codes::update::<S>)
        .delete(codes::delete::<S>),
    )
    .route("/codes/{codecategory}/{code}/history", get(codes::history::<S>))
    // Declarations
    .route("/fields/{entity}", get(fields::handler))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use commndata_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;
  use crate::actor::REMOTE_USER_HEADER;

  async fn make_state(default_actor: Option<&str>) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState::new(store, ServerConfig {
      host:          "127.0.0.1".to_string(),
      port:          8080,
      store_path:    PathBuf::from(":memory:"),
      default_actor: default_actor.map(str::to_string),
    })
  }

  async fn send(
    state: &AppState<SqliteStore>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut req = Request::builder()
      .method(method)
      .uri(uri)
      .header(REMOTE_USER_HEADER, "alice");
    let body = match body {
      Some(json) => {
        req = req.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };

    let resp = router(state.clone())
      .oneshot(req.body(body).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let json = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
  }

  async fn seed_category(state: &AppState<SqliteStore>) {
    let (status, _) = send(
      state,
      "POST",
      "/categories",
      Some(json!({ "codecategory": "COLOR", "name": "Colors" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  async fn create_red(state: &AppState<SqliteStore>, start: &str) -> Value {
    let (status, body) = send(
      state,
      "POST",
      "/codes",
      Some(json!({
        "codecategory": "COLOR",
        "code": "RED",
        "name": "Red",
        "start_date": start,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
  }

  #[tokio::test]
  async fn category_create_and_list() {
    let state = make_state(None).await;
    seed_category(&state).await;

    let (status, body) = send(&state, "GET", "/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["codecategory"], "COLOR");
    assert_eq!(body[0]["creator"], "alice");
    assert_eq!(body[0]["version"], 1);
  }

  #[tokio::test]
  async fn missing_actor_is_a_bad_request() {
    let state = make_state(None).await;
    let req = Request::builder()
      .method("POST")
      .uri("/categories")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json!({ "codecategory": "X", "name": "X" }).to_string()))
      .unwrap();

    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn default_actor_is_used_without_header() {
    let state = make_state(Some("batch")).await;
    let req = Request::builder()
      .method("POST")
      .uri("/categories")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json!({ "codecategory": "X", "name": "X" }).to_string()))
      .unwrap();

    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["creator"], "batch");
  }

  #[tokio::test]
  async fn code_requires_existing_category() {
    let state = make_state(None).await;
    let (status, body) = send(
      &state,
      "POST",
      "/codes",
      Some(json!({
        "codecategory": "NOPE",
        "code": "RED",
        "name": "Red",
        "start_date": "2024-01-01",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["violations"]["codecategory"][0]["kind"], "field");
  }

  #[tokio::test]
  async fn history_shows_linked_chain() {
    let state = make_state(None).await;
    seed_category(&state).await;
    create_red(&state, "2024-06-01").await;
    create_red(&state, "2024-01-01").await;

    let (status, body) = send(&state, "GET", "/codes/COLOR/RED/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["start_date"], "2024-01-01");
    assert_eq!(body[0]["end_date"], "2024-05-31");
    assert_eq!(body[1]["end_date"], Value::Null);
  }

  #[tokio::test]
  async fn stale_update_is_a_conflict() {
    let state = make_state(None).await;
    seed_category(&state).await;
    let created = create_red(&state, "2024-01-01").await;
    let uri = format!("/codes/{}", created["id"].as_str().unwrap());
    let update = |name: &str| {
      json!({ "version": 1, "name": name, "start_date": "2024-01-01" })
    };

    let (status, body) = send(&state, "PUT", &uri, Some(update("Scarlet"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);

    let (status, body) = send(&state, "PUT", &uri, Some(update("Crimson"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["violations"]["code master"][0]["kind"], "stale_write");

    let (_, body) = send(&state, "GET", &uri, None).await;
    assert_eq!(body["name"], "Scarlet");
  }

  #[tokio::test]
  async fn duplicate_start_date_is_unprocessable() {
    let state = make_state(None).await;
    seed_category(&state).await;
    create_red(&state, "2024-01-01").await;

    let (status, body) = send(
      &state,
      "POST",
      "/codes",
      Some(json!({
        "codecategory": "COLOR",
        "code": "RED",
        "name": "Red again",
        "start_date": "2024-01-01",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
      body["violations"]["start_date"][0]["kind"],
      "uniqueness_violation"
    );
  }

  #[tokio::test]
  async fn list_codes_as_of_a_date() {
    let state = make_state(None).await;
    seed_category(&state).await;
    create_red(&state, "2024-01-01").await;
    create_red(&state, "2024-06-01").await;

    let (status, body) = send(&state, "GET", "/codes?as_of=2024-03-15", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["start_date"], "2024-01-01");

    let (_, body) = send(&state, "GET", "/codes?code=RED", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn delete_reopens_predecessor() {
    let state = make_state(None).await;
    seed_category(&state).await;
    create_red(&state, "2024-01-01").await;
    let tail = create_red(&state, "2024-06-01").await;

    let uri = format!("/codes/{}?version=1", tail["id"].as_str().unwrap());
    let (status, body) = send(&state, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delete_flag"], true);

    let (_, body) = send(&state, "GET", "/codes/COLOR/RED/history", None).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["end_date"], Value::Null);

    let (_, body) = send(&state, "GET", "/codes?include_deleted=true", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn renaming_a_category_is_unprocessable() {
    let state = make_state(None).await;
    seed_category(&state).await;
    create_red(&state, "2024-01-01").await;

    let (_, categories) = send(&state, "GET", "/categories", None).await;
    let uri = format!("/categories/{}", categories[0]["id"].as_str().unwrap());
    let (status, body) = send(
      &state,
      "PUT",
      &uri,
      Some(json!({ "version": 1, "codecategory": "COLOUR", "name": "Colors" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["violations"]["codecategory"][0]["kind"], "field");
  }

  #[tokio::test]
  async fn version_ahead_of_stored_is_a_conflict() {
    let state = make_state(None).await;
    seed_category(&state).await;
    let created = create_red(&state, "2024-01-01").await;
    let uri = format!("/codes/{}", created["id"].as_str().unwrap());

    let (status, _) = send(
      &state,
      "PUT",
      &uri,
      Some(json!({ "version": 5, "name": "Scarlet", "start_date": "2024-01-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&state, "GET", &uri, None).await;
    assert_eq!(body["version"], 1);
  }

  #[tokio::test]
  async fn unknown_id_is_not_found() {
    let state = make_state(None).await;
    let uri = format!("/categories/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&state, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("code category"));
  }

  #[tokio::test]
  async fn field_declarations() {
    let state = make_state(None).await;
    let (status, body) =
      send(&state, "GET", "/fields/code_master?editing=true", None).await;
    assert_eq!(status, StatusCode::OK);
    let readonly = body["readonly_fields"].as_array().unwrap();
    assert!(readonly.contains(&json!("code")));
    assert!(readonly.contains(&json!("end_date")));

    let (status, _) = send(&state, "GET", "/fields/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
