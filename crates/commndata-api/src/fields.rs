//! `GET /fields/{entity}`: field declarations for form rendering.

use axum::{
  Json,
  extract::{Path, Query},
};
use commndata_core::{
  code::{CodeCategory, CodeMaster},
  entity::{Entity, FieldDeclarations},
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct Params {
  /// Declarations for editing an existing row rather than creating one.
  #[serde(default)]
  pub editing: bool,
}

pub async fn handler(
  Path(entity): Path<String>,
  Query(params): Query<Params>,
) -> Result<Json<FieldDeclarations>, ApiError> {
  let declarations = match entity.as_str() {
    CodeCategory::ENTITY => CodeCategory::declarations(params.editing),
    CodeMaster::ENTITY => CodeMaster::declarations(params.editing),
    _ => return Err(ApiError::NotFound(format!("unknown entity {entity:?}"))),
  };
  Ok(Json(declarations))
}
