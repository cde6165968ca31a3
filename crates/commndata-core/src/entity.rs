//! The `Entity` trait: what every auditable table row declares about itself.
//!
//! Declarations are plain field-name lists. The service reads them to build
//! natural keys; a presentation layer reads them to decide which fields are
//! editable and how to group them.

use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
  Error, Result,
  audit::{AUTOUPDATABLE_FIELDS, AuditEnvelope, NONINPUTABLE_FIELDS},
  store::{Direction, FieldValue, Filter},
};

/// A persisted, auditable row.
///
/// Implementors serialise flat: envelope fields and domain fields side by
/// side, so every declared field name is a top-level key.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
  /// Storage discriminant, e.g. `"code_master"`.
  const ENTITY: &'static str;

  /// Human-readable name used in messages and as the entity-level error key.
  const VERBOSE_NAME: &'static str;

  fn id(&self) -> Uuid;

  fn envelope(&self) -> &AuditEnvelope;

  fn envelope_mut(&mut self) -> &mut AuditEnvelope;

  /// Fields of the natural uniqueness constraint.
  fn unique_fields() -> &'static [&'static str];

  /// Field-level constraints, as `(field, message)` pairs.
  fn check_fields(&self) -> Vec<(&'static str, String)> { Vec::new() }

  fn default_ordering() -> Vec<(&'static str, Direction)> { Vec::new() }

  // ── Declarations ──────────────────────────────────────────────────────

  fn noninputable_fields() -> &'static [&'static str] { NONINPUTABLE_FIELDS }

  fn autoupdatable_fields() -> &'static [&'static str] { AUTOUPDATABLE_FIELDS }

  fn update_info_fieldsets() -> Vec<Vec<&'static str>> {
    vec![
      vec!["creator", "created_at"],
      vec!["updater", "updated_at", "version"],
    ]
  }

  fn validity_info_fieldsets() -> Vec<Vec<&'static str>> {
    vec![vec!["delete_flag"]]
  }

  /// Fields fixed once the row is first saved. A later save that changes
  /// one is rejected.
  fn immutable_fields() -> &'static [&'static str] { &[] }

  /// Fields a form must not let the user edit. `editing` is true when the row
  /// already exists.
  fn readonly_fields(editing: bool) -> Vec<&'static str> {
    let mut fields = Self::noninputable_fields().to_vec();
    if editing {
      fields.extend(Self::immutable_fields());
    }
    fields
  }

  fn declarations(editing: bool) -> FieldDeclarations {
    FieldDeclarations {
      entity:                  Self::ENTITY,
      verbose_name:            Self::VERBOSE_NAME,
      noninputable_fields:     Self::noninputable_fields().to_vec(),
      autoupdatable_fields:    Self::autoupdatable_fields().to_vec(),
      readonly_fields:         Self::readonly_fields(editing),
      update_info_fieldsets:   Self::update_info_fieldsets(),
      validity_info_fieldsets: Self::validity_info_fieldsets(),
      unique_fields:           Self::unique_fields().to_vec(),
    }
  }

  // ── Field access ──────────────────────────────────────────────────────

  /// The serialised value of a top-level field.
  fn field_value(&self, field: &str) -> Result<FieldValue> {
    let json = serde_json::to_value(self)?;
    let value = json
      .get(field)
      .ok_or_else(|| Error::UnsupportedField(field.to_owned()))?;
    FieldValue::from_json(field, value)
  }

  /// Values of [`unique_fields`](Entity::unique_fields), in declaration order.
  fn unique_key(&self) -> Result<Vec<FieldValue>> {
    Self::unique_fields()
      .iter()
      .map(|f| self.field_value(f))
      .collect()
  }

  /// Matches any other row holding this row's natural key.
  fn unique_filter(&self) -> Result<Filter> {
    let filter = Self::unique_fields()
      .iter()
      .zip(self.unique_key()?)
      .fold(Filter::new(), |filter, (field, value)| filter.eq(*field, value));
    Ok(filter.excluding(self.id()))
  }
}

/// Declarative field metadata for a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDeclarations {
  pub entity:                  &'static str,
  pub verbose_name:            &'static str,
  pub noninputable_fields:     Vec<&'static str>,
  pub autoupdatable_fields:    Vec<&'static str>,
  pub readonly_fields:         Vec<&'static str>,
  pub update_info_fieldsets:   Vec<Vec<&'static str>>,
  pub validity_info_fieldsets: Vec<Vec<&'static str>>,
  pub unique_fields:           Vec<&'static str>,
}

/// `(field, message)` if `value` is empty or longer than `max` characters.
pub fn check_text(
  field: &'static str,
  value: &str,
  max: usize,
  required: bool,
) -> Option<(&'static str, String)> {
  if required && value.trim().is_empty() {
    return Some((field, format!("{field} is required")));
  }
  let len = value.chars().count();
  if len > max {
    return Some((
      field,
      format!("{field} must be at most {max} characters (it has {len})"),
    ));
  }
  None
}
