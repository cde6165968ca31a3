//! Concrete tables: code categories and the temporal code master.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  audit::{AuditEnvelope, NONINPUTABLE_FIELDS},
  entity::{Entity, check_text},
  store::Direction,
  temporal::{Temporal, VALIDITY_FIELDS, Validity},
};

// ─── Code category ───────────────────────────────────────────────────────────

/// A flat lookup grouping, e.g. `COLOR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCategory {
  pub id:            Uuid,
  pub codecategory:  String,
  pub name:          String,
  #[serde(default)]
  pub display_order: Option<i64>,
  #[serde(flatten)]
  pub audit:         AuditEnvelope,
}

impl CodeCategory {
  pub fn new(codecategory: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id:            Uuid::new_v4(),
      codecategory:  codecategory.into(),
      name:          name.into(),
      display_order: None,
      audit:         AuditEnvelope::default(),
    }
  }
}

impl Entity for CodeCategory {
  const ENTITY: &'static str = "code_category";
  const VERBOSE_NAME: &'static str = "code category";

  fn id(&self) -> Uuid { self.id }

  fn envelope(&self) -> &AuditEnvelope { &self.audit }

  fn envelope_mut(&mut self) -> &mut AuditEnvelope { &mut self.audit }

  fn unique_fields() -> &'static [&'static str] { &["codecategory"] }

  /// Codes refer to their category by this name.
  fn immutable_fields() -> &'static [&'static str] { &["codecategory"] }

  fn check_fields(&self) -> Vec<(&'static str, String)> {
    [
      check_text("codecategory", &self.codecategory, 32, true),
      check_text("name", &self.name, 128, true),
    ]
    .into_iter()
    .flatten()
    .collect()
  }

  fn default_ordering() -> Vec<(&'static str, Direction)> {
    vec![
      ("display_order", Direction::Ascending),
      ("codecategory", Direction::Ascending),
    ]
  }
}

// ─── Code master ─────────────────────────────────────────────────────────────

/// A coded value within a category, valid from `start_date`.
///
/// Identity key: `(codecategory, code)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMaster {
  pub id:            Uuid,
  pub codecategory:  String,
  pub code:          String,
  pub name:          String,
  #[serde(default)]
  pub value:         String,
  #[serde(default)]
  pub display_order: Option<i64>,
  #[serde(flatten)]
  pub validity:      Validity,
  #[serde(flatten)]
  pub audit:         AuditEnvelope,
}

impl CodeMaster {
  pub fn new(
    codecategory: impl Into<String>,
    code: impl Into<String>,
    name: impl Into<String>,
    start_date: NaiveDate,
  ) -> Self {
    Self {
      id:            Uuid::new_v4(),
      codecategory:  codecategory.into(),
      code:          code.into(),
      name:          name.into(),
      value:         String::new(),
      display_order: None,
      validity:      Validity::starting(start_date),
      audit:         AuditEnvelope::default(),
    }
  }
}

impl Entity for CodeMaster {
  const ENTITY: &'static str = "code_master";
  const VERBOSE_NAME: &'static str = "code master";

  fn id(&self) -> Uuid { self.id }

  fn envelope(&self) -> &AuditEnvelope { &self.audit }

  fn envelope_mut(&mut self) -> &mut AuditEnvelope { &mut self.audit }

  fn unique_fields() -> &'static [&'static str] {
    &["codecategory", "code", "start_date"]
  }

  fn check_fields(&self) -> Vec<(&'static str, String)> {
    [
      check_text("codecategory", &self.codecategory, 32, true),
      check_text("code", &self.code, 32, true),
      check_text("name", &self.name, 128, true),
      check_text("value", &self.value, 128, false),
    ]
    .into_iter()
    .flatten()
    .collect()
  }

  fn default_ordering() -> Vec<(&'static str, Direction)> {
    vec![
      ("codecategory", Direction::Ascending),
      ("display_order", Direction::Ascending),
      ("code", Direction::Ascending),
      ("start_date", Direction::Descending),
    ]
  }

  fn validity_info_fieldsets() -> Vec<Vec<&'static str>> {
    vec![VALIDITY_FIELDS.to_vec()]
  }

  fn immutable_fields() -> &'static [&'static str] { Self::IDENTITY_FIELDS }

  fn readonly_fields(editing: bool) -> Vec<&'static str> {
    let mut fields = NONINPUTABLE_FIELDS.to_vec();
    fields.push("end_date");
    if editing {
      fields.extend(Self::immutable_fields());
    }
    fields
  }
}

impl Temporal for CodeMaster {
  const IDENTITY_FIELDS: &'static [&'static str] = &["codecategory", "code"];

  fn validity(&self) -> &Validity { &self.validity }

  fn validity_mut(&mut self) -> &mut Validity { &mut self.validity }
}
