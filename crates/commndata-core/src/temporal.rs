//! Temporal rows: a validity window plus an identity key.
//!
//! All rows sharing an identity key form a chain ordered by `start_date`.
//! Windows within a chain are contiguous: each row ends the day before the
//! next one starts, and only the newest row is open-ended.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  entity::Entity,
  store::{FieldValue, Filter},
};

/// Validity fields, grouped for display.
pub const VALIDITY_FIELDS: &[&str] = &["start_date", "end_date", "delete_flag"];

/// The day immediately preceding `date`.
pub fn day_before(date: NaiveDate) -> NaiveDate {
  date.pred_opt().unwrap_or(NaiveDate::MIN)
}

// ─── Validity window ─────────────────────────────────────────────────────────

/// An inclusive date range. `end_date == None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
  pub start_date: NaiveDate,
  #[serde(default)]
  pub end_date:   Option<NaiveDate>,
}

impl Validity {
  pub fn starting(start_date: NaiveDate) -> Self {
    Self { start_date, end_date: None }
  }

  pub fn is_open(&self) -> bool { self.end_date.is_none() }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start_date <= date && self.end_date.is_none_or(|end| date <= end)
  }
}

// ─── Identity key ────────────────────────────────────────────────────────────

/// The natural key of a temporal row minus its `start_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdentityKey(Vec<(String, FieldValue)>);

impl IdentityKey {
  pub fn new() -> Self { Self(Vec::new()) }

  pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    self.0.push((field.into(), value.into()));
    self
  }

  /// Filter matching every row of this chain, deleted or not.
  pub fn filter(&self) -> Filter {
    self
      .0
      .iter()
      .fold(Filter::new(), |filter, (f, v)| filter.eq(f.clone(), v.clone()))
  }
}

impl Default for IdentityKey {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for IdentityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, (field, value)) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      write!(f, "{field}={value}")?;
    }
    Ok(())
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A row with a validity window, grouped into chains by identity key.
///
/// `IDENTITY_FIELDS` plus `start_date` must equal
/// [`Entity::unique_fields`].
pub trait Temporal: Entity {
  const IDENTITY_FIELDS: &'static [&'static str];

  fn validity(&self) -> &Validity;

  fn validity_mut(&mut self) -> &mut Validity;

  fn start_date(&self) -> NaiveDate { self.validity().start_date }

  fn identity_key(&self) -> Result<IdentityKey> {
    Self::IDENTITY_FIELDS
      .iter()
      .try_fold(IdentityKey::new(), |key, field| {
        Ok(key.with(*field, self.field_value(field)?))
      })
  }
}
