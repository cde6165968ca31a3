//! Error types for `commndata-core`.
//!
//! User-recoverable failures (stale writes, history conflicts, uniqueness and
//! field constraints) are [`Violation`]s collected into [`ValidationErrors`]
//! and surfaced as [`Error::Rejected`]. Everything else is infrastructure.

use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ─── Violations ──────────────────────────────────────────────────────────────

/// A single reason a write was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
  /// The persisted row moved past the version the caller loaded.
  #[error(
    "{entity} {id} was modified by another user since it was loaded \
     (loaded version {loaded}); reload and retry"
  )]
  StaleWrite {
    entity: &'static str,
    id:     Uuid,
    loaded: u32,
  },

  /// The row was already superseded by a newer member of its chain.
  #[error(
    "{entity} {id} has been superseded by a newer entry starting \
     {newer_start}; edit the newest entry instead"
  )]
  HistoryConflict {
    entity:      &'static str,
    id:          Uuid,
    newer_start: NaiveDate,
  },

  #[error("{entity} with this {fields} already exists")]
  UniquenessViolation {
    entity: &'static str,
    fields: String,
  },

  /// A field-level constraint (required, maximum length, immutability).
  #[error("{message}")]
  Field { message: String },
}

impl Violation {
  pub fn field(message: impl Into<String>) -> Self {
    Self::Field { message: message.into() }
  }

  /// Whether the caller should reload before trying again.
  pub fn is_conflict(&self) -> bool {
    matches!(self, Self::StaleWrite { .. } | Self::HistoryConflict { .. })
  }
}

// ─── Collected violations ────────────────────────────────────────────────────

/// Violations keyed by the field or entity each one concerns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<Violation>>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn single(target: impl Into<String>, violation: Violation) -> Self {
    let mut errors = Self::new();
    errors.add(target, violation);
    errors
  }

  pub fn add(&mut self, target: impl Into<String>, violation: Violation) {
    self.0.entry(target.into()).or_default().push(violation);
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Total number of violations across all targets.
  pub fn len(&self) -> usize { self.0.values().map(Vec::len).sum() }

  /// Violations recorded against `target`; empty if there are none.
  pub fn get(&self, target: &str) -> &[Violation] {
    self.0.get(target).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Violation)> {
    self
      .0
      .iter()
      .flat_map(|(target, vs)| vs.iter().map(move |v| (target.as_str(), v)))
  }

  pub fn has_conflict(&self) -> bool {
    self.iter().any(|(_, v)| v.is_conflict())
  }

  /// `Ok(())` when nothing was recorded.
  pub fn into_result(self) -> Result<()> {
    if self.is_empty() { Ok(()) } else { Err(Error::Rejected(self)) }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, (target, violation)) in self.iter().enumerate() {
      if i > 0 {
        f.write_str("; ")?;
      }
      write!(f, "{target}: {violation}")?;
    }
    Ok(())
  }
}

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  #[error("rejected: {0}")]
  Rejected(ValidationErrors),

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: Uuid },

  #[error("acting user name must not be empty")]
  EmptyActor,

  #[error("field {0:?} cannot be used as a filter value")]
  UnsupportedField(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn rejected(target: impl Into<String>, violation: Violation) -> Self {
    Self::Rejected(ValidationErrors::single(target, violation))
  }

  pub fn violations(&self) -> Option<&ValidationErrors> {
    match self {
      Self::Rejected(errors) => Some(errors),
      _ => None,
    }
  }
}

impl From<ValidationErrors> for Error {
  fn from(errors: ValidationErrors) -> Self { Self::Rejected(errors) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collects_violations_per_target() {
    let mut errors = ValidationErrors::new();
    errors.add("code", Violation::field("code is required"));
    errors.add("name", Violation::field("name is required"));
    errors.add("code", Violation::field("code is too long"));

    assert_eq!(errors.len(), 3);
    assert_eq!(errors.get("code").len(), 2);
    assert!(errors.get("value").is_empty());
    assert!(!errors.has_conflict());
  }

  #[test]
  fn empty_errors_are_ok() {
    assert!(ValidationErrors::new().into_result().is_ok());
  }

  #[test]
  fn stale_write_is_a_conflict() {
    let errors = ValidationErrors::single(
      "code master",
      Violation::StaleWrite { entity: "code master", id: Uuid::nil(), loaded: 3 },
    );
    assert!(errors.has_conflict());
    assert!(matches!(errors.into_result(), Err(Error::Rejected(_))));
  }

  #[test]
  fn display_joins_targets() {
    let mut errors = ValidationErrors::new();
    errors.add("code", Violation::field("required"));
    errors.add("name", Violation::field("too long"));
    assert_eq!(errors.to_string(), "code: required; name: too long");
  }
}
