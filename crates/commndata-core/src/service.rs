//! [`RecordService`]: validation and the write pipeline.
//!
//! A save runs a fixed sequence of capabilities over one loaded snapshot:
//!
//! 1. field constraints declared by the entity,
//! 2. the optimistic [`LockGuard`] against the persisted row,
//! 3. immutability of [`Entity::immutable_fields`] on existing rows,
//! 4. the natural-key uniqueness pre-check,
//! 5. for temporal rows, the history-conflict check,
//! 6. audit stamping, chain planning, and one atomic
//!    [`RecordStore::save_all`].
//!
//! The persisted row and the chain are loaded once per call and never cached
//! across calls.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Actor, Error, Result, ValidationErrors, Violation,
  audit::AuditStamper,
  chain::ChainMaintainer,
  clock::{Clock, SystemClock},
  entity::Entity,
  guard::LockGuard,
  store::{Direction, Filter, Query, RecordStore},
  temporal::{IdentityKey, Temporal},
};

/// What one validate-then-save call knows about persisted state.
struct Inspection<R> {
  persisted: Option<R>,
  /// Live rows sharing the record's identity key, oldest first, without the
  /// record itself.
  chain:     Vec<R>,
  errors:    ValidationErrors,
}

/// Persistence service composed of an audit stamper, a lock guard and a
/// chain maintainer over a [`RecordStore`].
pub struct RecordService<S, C = SystemClock> {
  store:   Arc<S>,
  stamper: AuditStamper<C>,
  guard:   LockGuard,
  chain:   ChainMaintainer,
}

impl<S: RecordStore> RecordService<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      stamper: AuditStamper::new(SystemClock),
      guard: LockGuard,
      chain: ChainMaintainer,
    }
  }
}

impl<S, C> RecordService<S, C>
where
  S: RecordStore,
  Error: From<S::Error>,
  C: Clock,
{
  pub fn with_clock(store: Arc<S>, clock: C) -> Self {
    Self {
      store,
      stamper: AuditStamper::new(clock),
      guard: LockGuard,
      chain: ChainMaintainer,
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn get<R: Entity>(&self, id: Uuid) -> Result<R> {
    self
      .store
      .get::<R>(id)
      .await?
      .ok_or(Error::NotFound { entity: R::VERBOSE_NAME, id })
  }

  /// Rows matching `filter` in the entity's default ordering.
  pub async fn list<R: Entity>(&self, filter: Filter) -> Result<Vec<R>> {
    let query = R::default_ordering()
      .into_iter()
      .fold(Query::new(filter), |q, (field, dir)| q.order_by(field, dir));
    Ok(self.store.filter::<R>(query).await?)
  }

  /// Live rows matching `filter` whose validity window contains `date`.
  pub async fn list_effective<R: Temporal>(
    &self,
    filter: Filter,
    date: NaiveDate,
  ) -> Result<Vec<R>> {
    let mut rows = self.list::<R>(filter.live()).await?;
    rows.retain(|r| r.validity().contains(date));
    Ok(rows)
  }

  /// Every live row of one chain, oldest first.
  pub async fn chain<R: Temporal>(&self, key: &IdentityKey) -> Result<Vec<R>> {
    self.load_chain::<R>(key, None).await
  }

  /// The chain row in effect on `date`.
  pub async fn effective_at<R: Temporal>(
    &self,
    key: &IdentityKey,
    date: NaiveDate,
  ) -> Result<Option<R>> {
    let chain = self.load_chain::<R>(key, None).await?;
    Ok(chain.into_iter().rev().find(|r| r.validity().contains(date)))
  }

  // ── Auditable rows ────────────────────────────────────────────────────

  pub async fn validate<R: Entity>(&self, record: &R, actor: &Actor) -> Result<()> {
    let (_, errors) = self.inspect(record).await?;
    debug!(entity = R::ENTITY, id = %record.id(), %actor, violations = errors.len(), "validated");
    errors.into_result()
  }

  /// Validate, stamp and persist a non-temporal row.
  pub async fn save<R: Entity>(&self, mut record: R, actor: &Actor) -> Result<R> {
    let (persisted, errors) = self.inspect(&record).await?;
    reject_if_invalid::<R>(record.id(), errors)?;

    self.stamp(&mut record, persisted.as_ref(), actor)?;
    let saved = self.store.save(record).await?;

    info!(
      entity = R::ENTITY,
      id = %saved.id(),
      version = saved.envelope().version,
      %actor,
      "saved"
    );
    Ok(saved)
  }

  /// Soft-delete a row the caller loaded at `version`.
  pub async fn soft_delete<R: Entity>(&self, id: Uuid, version: u32, actor: &Actor) -> Result<R> {
    let mut record = self.get::<R>(id).await?;
    record.envelope_mut().version = version;
    record.envelope_mut().delete_flag = true;
    self.save(record, actor).await
  }

  // ── Temporal rows ─────────────────────────────────────────────────────

  pub async fn validate_temporal<R: Temporal>(&self, record: &R, actor: &Actor) -> Result<()> {
    let inspection = self.inspect_temporal(record).await?;
    debug!(
      entity = R::ENTITY,
      id = %record.id(),
      %actor,
      violations = inspection.errors.len(),
      "validated"
    );
    inspection.errors.into_result()
  }

  /// Validate, stamp, relink the chain and persist a temporal row.
  ///
  /// `end_date` is always computed from the chain; a caller-supplied value is
  /// overwritten. Neighbor updates and the row itself commit together.
  ///
  /// Two concurrent inserts ahead of the same chain head share no written
  /// row, so neither compare-and-set nor the unique key orders them; both
  /// commit with overlapping windows.
  pub async fn save_temporal<R: Temporal>(&self, mut record: R, actor: &Actor) -> Result<R> {
    let Inspection { persisted, chain, errors } = self.inspect_temporal(&record).await?;
    reject_if_invalid::<R>(record.id(), errors)?;

    self.stamp(&mut record, persisted.as_ref(), actor)?;
    let cascades = self.chain.plan(&mut record, persisted.as_ref(), &chain);

    let mut writes = Vec::with_capacity(cascades.len() + 1);
    for mut neighbour in cascades {
      self.stamper.touch(neighbour.envelope_mut(), actor)?;
      debug!(
        entity = R::ENTITY,
        id = %neighbour.id(),
        end_date = ?neighbour.validity().end_date,
        "relinking neighbour"
      );
      writes.push(neighbour);
    }
    writes.push(record.clone());
    let written = writes.len();
    self.store.save_all(writes).await?;

    info!(
      entity = R::ENTITY,
      id = %record.id(),
      version = record.envelope().version,
      start_date = %record.start_date(),
      end_date = ?record.validity().end_date,
      cascades = written - 1,
      %actor,
      "saved"
    );
    Ok(record)
  }

  /// Soft-delete a temporal row the caller loaded at `version`. Its
  /// predecessor is relinked to whatever follows it.
  pub async fn soft_delete_temporal<R: Temporal>(
    &self,
    id: Uuid,
    version: u32,
    actor: &Actor,
  ) -> Result<R> {
    let mut record = self.get::<R>(id).await?;
    record.envelope_mut().version = version;
    record.envelope_mut().delete_flag = true;
    self.save_temporal(record, actor).await
  }

  // ── Pipeline steps ────────────────────────────────────────────────────

  async fn inspect<R: Entity>(&self, record: &R) -> Result<(Option<R>, ValidationErrors)> {
    let mut errors = ValidationErrors::new();
    for (field, message) in record.check_fields() {
      errors.add(field, Violation::field(message));
    }

    let persisted = self.store.get::<R>(record.id()).await?;

    // A stale version invalidates everything else we could say.
    if let Err(violation) = self.guard.check(record, persisted.as_ref()) {
      errors.add(R::VERBOSE_NAME, violation);
      return Ok((persisted, errors));
    }

    if let Some(original) = &persisted {
      for field in R::immutable_fields() {
        if original.field_value(field)? != record.field_value(field)? {
          errors.add(
            *field,
            Violation::field(format!(
              "{field} cannot be changed once saved; create a new entry instead"
            )),
          );
        }
      }
    }

    if self.store.exists::<R>(record.unique_filter()?).await? {
      let fields = R::unique_fields();
      errors.add(
        fields.last().copied().unwrap_or(R::VERBOSE_NAME),
        Violation::UniquenessViolation {
          entity: R::VERBOSE_NAME,
          fields: fields.join(", "),
        },
      );
    }

    Ok((persisted, errors))
  }

  async fn inspect_temporal<R: Temporal>(&self, record: &R) -> Result<Inspection<R>> {
    let (persisted, mut errors) = self.inspect(record).await?;
    if errors.has_conflict() {
      return Ok(Inspection { persisted, chain: Vec::new(), errors });
    }

    let key = record.identity_key()?;
    let chain = self.load_chain::<R>(&key, Some(record.id())).await?;

    if let Some(original) = &persisted {
      let original_key = original.identity_key()?;
      if original_key == key {
        self.check_history(original, &chain, &mut errors);
      } else {
        let original_chain = self.load_chain::<R>(&original_key, Some(original.id())).await?;
        self.check_history(original, &original_chain, &mut errors);
      }
    }

    Ok(Inspection { persisted, chain, errors })
  }

  /// A row with a live successor in its chain has been superseded.
  fn check_history<R: Temporal>(&self, original: &R, chain: &[R], errors: &mut ValidationErrors) {
    if let Some(newer) = self.chain.newer_than(chain, original.start_date()) {
      errors.add(R::VERBOSE_NAME, Violation::HistoryConflict {
        entity:      R::VERBOSE_NAME,
        id:          original.id(),
        newer_start: newer.start_date(),
      });
    }
  }

  async fn load_chain<R: Temporal>(
    &self,
    key: &IdentityKey,
    exclude: Option<Uuid>,
  ) -> Result<Vec<R>> {
    let mut filter = key.filter().live();
    if let Some(id) = exclude {
      filter = filter.excluding(id);
    }
    let query = Query::new(filter).order_by("start_date", Direction::Ascending);
    let rows = self.store.filter::<R>(query).await?;
    debug!(entity = R::ENTITY, %key, rows = rows.len(), "loaded chain");
    Ok(rows)
  }

  fn stamp<R: Entity>(&self, record: &mut R, persisted: Option<&R>, actor: &Actor) -> Result<()> {
    match persisted {
      Some(p) => self.stamper.stamp_update(record.envelope_mut(), p.envelope(), actor),
      None => {
        self.stamper.stamp_create(record.envelope_mut(), actor);
        Ok(())
      }
    }
  }
}

fn reject_if_invalid<R: Entity>(id: Uuid, errors: ValidationErrors) -> Result<()> {
  if !errors.is_empty() {
    warn!(entity = R::ENTITY, %id, %errors, "save rejected");
  }
  errors.into_result()
}
