//! Error type for `commndata-store-sqlite`.

use commndata_core::Violation;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] commndata_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// Field names become JSON paths; only `[A-Za-z0-9_]` is accepted.
  #[error("invalid field name: {0:?}")]
  InvalidField(String),

  /// The compare-and-set update found a newer version, or an insert found
  /// the primary key already taken.
  #[error("{entity} {id} was modified concurrently (loaded version {loaded})")]
  StaleWrite {
    entity: &'static str,
    id:     Uuid,
    loaded: u32,
  },

  #[error("{entity} with this {fields} already exists")]
  Duplicate {
    entity: &'static str,
    target: &'static str,
    fields: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for commndata_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(e) => e,
      Error::Json(e) => Self::Serialization(e),
      Error::StaleWrite { entity, id, loaded } => {
        Self::rejected(entity, Violation::StaleWrite { entity, id, loaded })
      }
      Error::Duplicate { entity, target, fields } => {
        Self::rejected(target, Violation::UniquenessViolation { entity, fields })
      }
      other => Self::Store(Box::new(other)),
    }
  }
}
