//! Optimistic lock guard.
//!
//! A pure comparison between the version a caller loaded and the version
//! currently stored. It takes no lock; the backend's compare-and-set update
//! is the atomic backstop for the window between this check and the write.

use crate::{Violation, entity::Entity};

#[derive(Debug, Clone, Copy, Default)]
pub struct LockGuard;

impl LockGuard {
  /// Refuse the write unless `record` carries exactly the persisted version.
  /// A record with no persisted row is new and always passes.
  pub fn check<R: Entity>(&self, record: &R, persisted: Option<&R>) -> Result<(), Violation> {
    let Some(persisted) = persisted else {
      return Ok(());
    };
    let loaded = record.envelope().version;
    if persisted.envelope().version != loaded {
      return Err(Violation::StaleWrite {
        entity: R::VERBOSE_NAME,
        id: record.id(),
        loaded,
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::code::CodeCategory;

  fn with_version(v: u32) -> CodeCategory {
    let mut row = CodeCategory::new("COLOR", "Colors");
    row.audit.version = v;
    row
  }

  #[test]
  fn new_records_pass() {
    assert!(LockGuard.check(&with_version(1), None).is_ok());
  }

  #[test]
  fn matching_version_passes() {
    let row = with_version(3);
    assert!(LockGuard.check(&row, Some(&row.clone())).is_ok());
  }

  #[test]
  fn newer_persisted_version_is_stale() {
    let loaded = with_version(3);
    let mut stored = loaded.clone();
    stored.audit.version = 4;

    let err = LockGuard.check(&loaded, Some(&stored)).unwrap_err();
    assert_eq!(err, Violation::StaleWrite {
      entity: "code category",
      id:     loaded.id,
      loaded: 3,
    });
  }

  #[test]
  fn version_ahead_of_persisted_is_stale() {
    let stored = with_version(1);
    let mut claimed = stored.clone();
    claimed.audit.version = 5;
    assert!(LockGuard.check(&claimed, Some(&stored)).is_err());

    claimed.audit.version = u32::MAX;
    assert!(LockGuard.check(&claimed, Some(&stored)).is_err());
  }
}
