//! Encoding helpers between domain types and the plain-text representations
//! stored in SQLite columns.
//!
//! UUIDs are stored as hyphenated lowercase strings. Records and natural keys
//! are stored as compact JSON. Dates compare as `YYYY-MM-DD` text.

use commndata_core::{entity::Entity, store::FieldValue};
use rusqlite::types::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

// ─── Field values ────────────────────────────────────────────────────────────

/// SQL value comparable with `json_extract` output for the same field.
pub fn encode_field_value(v: &FieldValue) -> Value {
  match v {
    FieldValue::Null => Value::Null,
    FieldValue::Bool(b) => Value::Integer(i64::from(*b)),
    FieldValue::Integer(i) => Value::Integer(*i),
    FieldValue::Text(s) => Value::Text(s.clone()),
    FieldValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
  }
}

/// `$.field` for a plain identifier.
pub fn json_path(field: &str) -> Result<String> {
  let valid = !field.is_empty()
    && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
  if !valid {
    return Err(Error::InvalidField(field.to_owned()));
  }
  Ok(format!("$.{field}"))
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Everything needed to write one record, detached from its type so it can
/// move onto the database thread.
pub struct RowWrite {
  pub record_id:  String,
  pub id:         Uuid,
  pub version:    u32,
  pub unique_key: String,
  pub body:       String,
}

impl RowWrite {
  pub fn prepare<R: Entity>(record: &R) -> Result<Self> {
    Ok(Self {
      record_id:  encode_uuid(record.id()),
      id:         record.id(),
      version:    record.envelope().version,
      unique_key: serde_json::to_string(&record.unique_key()?)?,
      body:       serde_json::to_string(record)?,
    })
  }
}

pub fn decode_record<R: Entity>(body: &str) -> Result<R> {
  Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  #[test]
  fn json_path_rejects_injection() {
    assert_eq!(json_path("start_date").unwrap(), "$.start_date");
    assert!(matches!(json_path("a') OR 1=1 --"), Err(Error::InvalidField(_))));
    assert!(matches!(json_path(""), Err(Error::InvalidField(_))));
  }

  #[test]
  fn field_values_match_json_extract_types() {
    assert_eq!(encode_field_value(&FieldValue::Bool(true)), Value::Integer(1));
    assert_eq!(
      encode_field_value(&FieldValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())),
      Value::Text("2024-02-29".into())
    );
  }
}
