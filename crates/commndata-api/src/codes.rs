//! Handlers for `/codes` endpoints.
//!
//! Every write runs the temporal pipeline: the neighbours of the row are
//! relinked in the same transaction and `end_date` is always computed.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use commndata_core::{
  Error, ValidationErrors, Violation,
  code::{CodeCategory, CodeMaster},
  store::{Filter, RecordStore},
  temporal::IdentityKey,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, actor::ActingUser, categories::VersionParams, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub codecategory:    Option<String>,
  pub code:            Option<String>,
  /// Only rows in effect on this date.
  pub as_of:           Option<NaiveDate>,
  #[serde(default)]
  pub include_deleted: bool,
}

/// `GET /codes[?codecategory=..&code=..&as_of=YYYY-MM-DD&include_deleted=true]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CodeMaster>>, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  let mut filter = Filter::new();
  if let Some(codecategory) = params.codecategory {
    filter = filter.eq("codecategory", codecategory);
  }
  if let Some(code) = params.code {
    filter = filter.eq("code", code);
  }

  let rows = match params.as_of {
    Some(date) => state.service.list_effective(filter, date).await?,
    None if params.include_deleted => state.service.list(filter).await?,
    None => state.service.list(filter.live()).await?,
  };
  Ok(Json(rows))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub codecategory:  String,
  pub code:          String,
  pub name:          String,
  #[serde(default)]
  pub value:         String,
  #[serde(default)]
  pub display_order: Option<i64>,
  pub start_date:    NaiveDate,
}

/// `POST /codes`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  ActingUser(actor): ActingUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  let category = Filter::new()
    .eq("codecategory", body.codecategory.as_str())
    .live();
  if state.service.list::<CodeCategory>(category).await?.is_empty() {
    return Err(ApiError::Rejected(ValidationErrors::single(
      "codecategory",
      Violation::field(format!("unknown code category {:?}", body.codecategory)),
    )));
  }

  let mut code = CodeMaster::new(body.codecategory, body.code, body.name, body.start_date);
  code.value = body.value;
  code.display_order = body.display_order;
  let saved = state.service.save_temporal(code, &actor).await?;
  Ok((StatusCode::CREATED, Json(saved)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /codes/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CodeMaster>, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  Ok(Json(state.service.get(id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// Identity fields may be sent back unchanged; a different value is
/// rejected by the service.
#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub version:       u32,
  pub name:          String,
  #[serde(default)]
  pub value:         String,
  #[serde(default)]
  pub display_order: Option<i64>,
  pub start_date:    NaiveDate,
  #[serde(default)]
  pub codecategory:  Option<String>,
  #[serde(default)]
  pub code:          Option<String>,
}

/// `PUT /codes/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  ActingUser(actor): ActingUser,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<CodeMaster>, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  let mut code: CodeMaster = state.service.get(id).await?;
  if let Some(codecategory) = body.codecategory {
    code.codecategory = codecategory;
  }
  if let Some(c) = body.code {
    code.code = c;
  }
  code.name = body.name;
  code.value = body.value;
  code.display_order = body.display_order;
  code.validity.start_date = body.start_date;
  code.audit.version = body.version;
  Ok(Json(state.service.save_temporal(code, &actor).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /codes/{id}?version=N`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  ActingUser(actor): ActingUser,
  Path(id): Path<Uuid>,
  Query(params): Query<VersionParams>,
) -> Result<Json<CodeMaster>, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  let deleted = state
    .service
    .soft_delete_temporal::<CodeMaster>(id, params.version, &actor)
    .await?;
  Ok(Json(deleted))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /codes/{codecategory}/{code}/history`: live rows, oldest first.
pub async fn history<S>(
  State(state): State<AppState<S>>,
  Path((codecategory, code)): Path<(String, String)>,
) -> Result<Json<Vec<CodeMaster>>, ApiError>
where
  S: RecordStore + Clone + 'static,
  Error: From<S::Error>,
{
  let key = IdentityKey::new()
    .with("codecategory", codecategory)
    .with("code", code);
  Ok(Json(state.service.chain(&key).await?))
}
