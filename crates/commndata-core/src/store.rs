//! The `RecordStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `commndata-store-sqlite`). The service layer depends on this abstraction,
//! not on any concrete backend.

use std::{collections::BTreeMap, fmt, future::Future};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result, entity::Entity};

// ─── Field values ────────────────────────────────────────────────────────────

/// A scalar field value usable in equality filters and natural keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
  Null,
  Bool(bool),
  Integer(i64),
  Text(String),
  Date(NaiveDate),
}

impl FieldValue {
  /// Convert a serialised field. Nested values are not filterable.
  pub fn from_json(field: &str, value: &serde_json::Value) -> Result<Self> {
    use serde_json::Value;
    match value {
      Value::Null => Ok(Self::Null),
      Value::Bool(b) => Ok(Self::Bool(*b)),
      Value::Number(n) => n
        .as_i64()
        .map(Self::Integer)
        .ok_or_else(|| Error::UnsupportedField(field.to_owned())),
      Value::String(s) => Ok(Self::Text(s.clone())),
      Value::Array(_) | Value::Object(_) => {
        Err(Error::UnsupportedField(field.to_owned()))
      }
    }
  }
}

impl fmt::Display for FieldValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => f.write_str("null"),
      Self::Bool(b) => write!(f, "{b}"),
      Self::Integer(i) => write!(f, "{i}"),
      Self::Text(s) => f.write_str(s),
      Self::Date(d) => write!(f, "{d}"),
    }
  }
}

impl From<&str> for FieldValue {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for FieldValue {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for FieldValue {
  fn from(i: i64) -> Self { Self::Integer(i) }
}

impl From<bool> for FieldValue {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<NaiveDate> for FieldValue {
  fn from(d: NaiveDate) -> Self { Self::Date(d) }
}

// ─── Query types ─────────────────────────────────────────────────────────────

/// Field-equality filter, optionally excluding one primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  pub equals:  BTreeMap<String, FieldValue>,
  /// Leave this row out of the result (used to skip the record being saved).
  pub exclude: Option<Uuid>,
}

impl Filter {
  pub fn new() -> Self { Self::default() }

  pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    self.equals.insert(field.into(), value.into());
    self
  }

  pub fn excluding(mut self, id: Uuid) -> Self {
    self.exclude = Some(id);
    self
  }

  /// Restrict to rows that have not been soft-deleted.
  pub fn live(self) -> Self { self.eq("delete_flag", false) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Ascending,
  Descending,
}

/// Parameters for [`RecordStore::filter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
  pub filter:   Filter,
  pub order_by: Vec<(String, Direction)>,
}

impl Query {
  pub fn new(filter: Filter) -> Self {
    Self { filter, order_by: Vec::new() }
  }

  pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
    self.order_by.push((field.into(), direction));
    self
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over persistent row storage.
///
/// Backends must make each single-row write atomic, enforce the natural-key
/// uniqueness constraint declared by [`Entity::unique_fields`], and commit
/// [`save_all`](RecordStore::save_all) as one transaction.
///
/// A record with `version == 1` is inserted. Any other record is an update
/// that only applies if the persisted version equals
/// `version - 1`, the version the caller loaded; otherwise the write fails
/// with a stale-write violation.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Retrieve a row by primary key. Returns `None` if not found.
  fn get<R: Entity>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<R>, Self::Error>> + Send + '_;

  /// All rows matching `query.filter`, in `query.order_by` order.
  fn filter<R: Entity>(
    &self,
    query: Query,
  ) -> impl Future<Output = Result<Vec<R>, Self::Error>> + Send + '_;

  /// Whether any row matches `filter`.
  fn exists<R: Entity>(
    &self,
    filter: Filter,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Persist one row and return it as stored.
  fn save<R: Entity>(
    &self,
    record: R,
  ) -> impl Future<Output = Result<R, Self::Error>> + Send + '_;

  /// Persist every row in a single transaction; either all are written or
  /// none are.
  fn save_all<R: Entity>(
    &self,
    records: Vec<R>,
  ) -> impl Future<Output = Result<Vec<R>, Self::Error>> + Send + '_;
}
