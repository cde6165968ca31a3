//! Acting-user extractor.
//!
//! Authentication happens upstream; an authenticating proxy forwards the
//! user name in `X-Remote-User`. Without it the configured `default_actor`
//! is used.

use axum::{extract::FromRequestParts, http::request::Parts};
use commndata_core::{Actor, Error, store::RecordStore};

use crate::{AppState, error::ApiError};

pub const REMOTE_USER_HEADER: &str = "x-remote-user";

/// The user a write is attributed to.
#[derive(Debug, Clone)]
pub struct ActingUser(pub Actor);

impl<S> FromRequestParts<AppState<S>> for ActingUser
where
  S: RecordStore + 'static,
  Error: From<S::Error>,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let header = parts
      .headers
      .get(REMOTE_USER_HEADER)
      .map(|v| {
        v.to_str()
          .map_err(|_| ApiError::BadRequest(format!("{REMOTE_USER_HEADER} is not valid UTF-8")))
      })
      .transpose()?;

    let name = header
      .or(state.config.default_actor.as_deref())
      .ok_or_else(|| {
        ApiError::BadRequest(format!(
          "no acting user: send {REMOTE_USER_HEADER} or configure default_actor"
        ))
      })?;

    Ok(ActingUser(Actor::new(name)?))
  }
}
