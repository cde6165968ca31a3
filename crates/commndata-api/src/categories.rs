//! Handlers for `/categories` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/categories` | Optional `?include_deleted=true` |
//! | `POST`   | `/categories` | Body: `{"codecategory":"COLOR","name":"Colors"}` |
//! | `GET`    | `/categories/{id}` | 404 if not found |
//! | `PUT`    | `/categories/{id}` | Body carries the loaded `version` |
//! | `DELETE` | `/categories/{id}?version=N` | Soft delete |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use commndata_core::{Error, code::CodeCategory, store::{Filter, RecordStore}};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, actor::ActingUser, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub include_deleted: bool,
}

/// `GET /categories[?include_deleted=true]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CodeCategory>>, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  let filter = if params.include_deleted { Filter::new() } else { Filter::new().live() };
  Ok(Json(state.service.list(filter).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CategoryBody {
  pub codecategory:  String,
  pub name:          String,
  #[serde(default)]
  pub display_order: Option<i64>,
}

/// `POST /categories`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ActingUser(actor): ActingUser,
  Json(body): Json<CategoryBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  let mut category = CodeCategory::new(body.codecategory, body.name);
  category.display_order = body.display_order;
  let saved = state.service.save(category, &actor).await?;
  Ok((StatusCode::CREATED, Json(saved)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /categories/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CodeCategory>, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  Ok(Json(state.service.get(id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  /// The version the caller loaded.
  pub version: u32,
  #[serde(flatten)]
  pub fields:  CategoryBody,
}

/// `PUT /categories/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  ActingUser(actor): ActingUser,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<CodeCategory>, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  let mut category: CodeCategory = state.service.get(id).await?;
  category.codecategory = body.fields.codecategory;
  category.name = body.fields.name;
  category.display_order = body.fields.display_order;
  category.audit.version = body.version;
  Ok(Json(state.service.save(category, &actor).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VersionParams {
  pub version: u32,
}

/// `DELETE /categories/{id}?version=N`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  ActingUser(actor): ActingUser,
  Path(id): Path<Uuid>,
  Query(params): Query<VersionParams>,
) -> Result<Json<CodeCategory>, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  let deleted = state
    .service
    .soft_delete::<CodeCategory>(id, params.version, &actor)
    .await?;
  Ok(Json(deleted))
}
