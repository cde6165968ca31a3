//! The audit envelope carried by every persisted row, and the stamper that
//! maintains it.
//!
//! `creator`/`created_at` are written once when a row is first saved.
//! `updater`/`updated_at`/`version` are rewritten on every save, including the
//! first. `version` starts at 1 and grows by exactly one per update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Actor, Error, Result, Violation, clock::Clock};

/// Fields the system manages; never accepted from user input.
pub const NONINPUTABLE_FIELDS: &[&str] =
  &["creator", "created_at", "updater", "updated_at", "version"];

/// Fields rewritten on every update.
pub const AUTOUPDATABLE_FIELDS: &[&str] = &["updater", "updated_at", "version"];

// ─── Envelope ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEnvelope {
  pub version:     u32,
  pub created_at:  DateTime<Utc>,
  pub creator:     String,
  pub updated_at:  DateTime<Utc>,
  pub updater:     String,
  /// Soft-delete marker. Deleted rows keep their natural-key slot.
  #[serde(default)]
  pub delete_flag: bool,
}

impl AuditEnvelope {
  /// Initial values for a row created by `actor` at `now`.
  pub fn new(actor: &Actor, now: DateTime<Utc>) -> Self {
    Self {
      version:     1,
      created_at:  now,
      creator:     actor.name().to_owned(),
      updated_at:  now,
      updater:     actor.name().to_owned(),
      delete_flag: false,
    }
  }
}

/// An unsaved envelope. The stamper fills it in on first save.
impl Default for AuditEnvelope {
  fn default() -> Self {
    Self {
      version:     1,
      created_at:  DateTime::<Utc>::default(),
      creator:     String::new(),
      updated_at:  DateTime::<Utc>::default(),
      updater:     String::new(),
      delete_flag: false,
    }
  }
}

// ─── Stamper ─────────────────────────────────────────────────────────────────

/// Writes audit stamps using the acting user and an injected clock.
#[derive(Debug, Clone)]
pub struct AuditStamper<C> {
  clock: C,
}

impl<C: Clock> AuditStamper<C> {
  pub fn new(clock: C) -> Self { Self { clock } }

  /// Stamp a row that is about to be inserted.
  pub fn stamp_create(&self, envelope: &mut AuditEnvelope, actor: &Actor) {
    let delete_flag = envelope.delete_flag;
    *envelope = AuditEnvelope::new(actor, self.clock.now());
    envelope.delete_flag = delete_flag;
  }

  /// Stamp an edit of `persisted`. Creation stamps are copied from the stored
  /// row so an in-memory record can never rewrite them.
  pub fn stamp_update(
    &self,
    envelope: &mut AuditEnvelope,
    persisted: &AuditEnvelope,
    actor: &Actor,
  ) -> Result<()> {
    envelope.creator = persisted.creator.clone();
    envelope.created_at = persisted.created_at;
    self.touch(envelope, actor)
  }

  /// Bump the version and updater stamps. Used directly for cascade writes,
  /// which operate on freshly loaded rows.
  pub fn touch(&self, envelope: &mut AuditEnvelope, actor: &Actor) -> Result<()> {
    envelope.version = envelope.version.checked_add(1).ok_or_else(|| {
      Error::rejected(
        "version",
        Violation::field(format!("version {} cannot be incremented", envelope.version)),
      )
    })?;
    envelope.updater = actor.name().to_owned();
    envelope.updated_at = self.clock.now();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::clock::FixedClock;

  fn stamper(secs: i64) -> AuditStamper<FixedClock> {
    AuditStamper::new(FixedClock(Utc.timestamp_opt(secs, 0).unwrap()))
  }

  #[test]
  fn create_sets_every_stamp() {
    let alice = Actor::new("alice").unwrap();
    let mut env = AuditEnvelope { version: 7, ..AuditEnvelope::default() };

    stamper(1_000).stamp_create(&mut env, &alice);

    assert_eq!(env.version, 1);
    assert_eq!(env.creator, "alice");
    assert_eq!(env.updater, "alice");
    assert_eq!(env.created_at, env.updated_at);
  }

  #[test]
  fn update_preserves_creation_stamps() {
    let alice = Actor::new("alice").unwrap();
    let bob = Actor::new("bob").unwrap();

    let mut persisted = AuditEnvelope::default();
    stamper(1_000).stamp_create(&mut persisted, &alice);

    let mut edited = persisted.clone();
    edited.creator = "mallory".into();
    stamper(2_000).stamp_update(&mut edited, &persisted, &bob).unwrap();

    assert_eq!(edited.version, 2);
    assert_eq!(edited.creator, "alice");
    assert_eq!(edited.created_at, persisted.created_at);
    assert_eq!(edited.updater, "bob");
    assert_eq!(edited.updated_at, Utc.timestamp_opt(2_000, 0).unwrap());
  }

  #[test]
  fn version_overflow_is_rejected() {
    let alice = Actor::new("alice").unwrap();
    let mut env = AuditEnvelope { version: u32::MAX, ..AuditEnvelope::default() };

    let err = stamper(0).touch(&mut env, &alice).unwrap_err();

    let errors = err.violations().unwrap();
    assert_eq!(errors.get("version").len(), 1);
    assert_eq!(env.version, u32::MAX);
  }

  #[test]
  fn create_keeps_delete_flag() {
    let alice = Actor::new("alice").unwrap();
    let mut env = AuditEnvelope { delete_flag: true, ..AuditEnvelope::default() };
    stamper(0).stamp_create(&mut env, &alice);
    assert!(env.delete_flag);
  }
}
