//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use commndata_core::ValidationErrors;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The service refused the write; the caller can correct and retry.
  #[error("{0}")]
  Rejected(ValidationErrors),

  #[error("{0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Rejected(errors) if errors.has_conflict() => StatusCode::CONFLICT,
      ApiError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<commndata_core::Error> for ApiError {
  fn from(e: commndata_core::Error) -> Self {
    use commndata_core::Error;
    match e {
      Error::Rejected(errors) => ApiError::Rejected(errors),
      Error::NotFound { .. } => ApiError::NotFound(e.to_string()),
      Error::EmptyActor | Error::UnsupportedField(_) => ApiError::BadRequest(e.to_string()),
      other => ApiError::Internal(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let violations = match &self {
      ApiError::Rejected(errors) => json!(errors),
      _ => json!({}),
    };
    let body = json!({ "error": self.to_string(), "violations": violations });
    (status, Json(body)).into_response()
  }
}
