//! [`SqliteStore`]: the SQLite implementation of [`RecordStore`].

use std::path::Path;

use commndata_core::{
  entity::Entity,
  store::{Direction, FieldValue, Filter, Query, RecordStore},
};
use rusqlite::{OptionalExtension as _, types::Value};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RowWrite, decode_record, encode_field_value, encode_uuid, json_path},
  schema::SCHEMA,
};

/// How a batch write ended on the database thread.
enum WriteOutcome {
  Committed,
  /// The write at this index lost its compare-and-set or its insert slot,
  /// or carried no valid version.
  Stale(usize),
  /// The write at this index hit the natural-key constraint.
  Duplicate(usize),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Write every row in one transaction. Nothing is committed unless every
  /// row applies.
  async fn write_rows<R: Entity>(&self, rows: Vec<RowWrite>) -> Result<()> {
    let keys: Vec<(Uuid, u32)> = rows.iter().map(|r| (r.id, r.version)).collect();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        for (i, row) in rows.iter().enumerate() {
          let applied = if row.version == 0 {
            return Ok(WriteOutcome::Stale(i));
          } else if row.version == 1 {
            let taken = tx
              .query_row(
                "SELECT 1 FROM records WHERE entity = ?1 AND record_id = ?2",
                rusqlite::params![R::ENTITY, row.record_id],
                |_| Ok(true),
              )
              .optional()?
              .unwrap_or(false);
            if taken {
              return Ok(WriteOutcome::Stale(i));
            }
            tx.execute(
              "INSERT INTO records (entity, record_id, version, unique_key, body)
               VALUES (?1, ?2, ?3, ?4, ?5)",
              rusqlite::params![
                R::ENTITY,
                row.record_id,
                row.version,
                row.unique_key,
                row.body,
              ],
            )
          } else {
            // Creation stamps are carried over from the stored body.
            tx.execute(
              "UPDATE records
               SET version    = ?3,
                   unique_key = ?4,
                   body       = json_set(?5,
                                  '$.creator',    json_extract(body, '$.creator'),
                                  '$.created_at', json_extract(body, '$.created_at'))
               WHERE entity = ?1 AND record_id = ?2 AND version = ?6",
              rusqlite::params![
                R::ENTITY,
                row.record_id,
                row.version,
                row.unique_key,
                row.body,
                row.version - 1,
              ],
            )
          };

          match applied {
            Ok(0) => return Ok(WriteOutcome::Stale(i)),
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
              return Ok(WriteOutcome::Duplicate(i));
            }
            Err(e) => return Err(e.into()),
          }
        }

        tx.commit()?;
        Ok(WriteOutcome::Committed)
      })
      .await?;

    match outcome {
      WriteOutcome::Committed => {
        debug!(entity = R::ENTITY, rows = keys.len(), "committed");
        Ok(())
      }
      WriteOutcome::Stale(i) => {
        let (id, version) = keys[i];
        Err(Error::StaleWrite {
          entity: R::VERBOSE_NAME,
          id,
          loaded: version.saturating_sub(1),
        })
      }
      WriteOutcome::Duplicate(_) => {
        let fields = R::unique_fields();
        Err(Error::Duplicate {
          entity: R::VERBOSE_NAME,
          target: fields.last().copied().unwrap_or(R::VERBOSE_NAME),
          fields: fields.join(", "),
        })
      }
    }
  }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

/// `WHERE` clause and positional parameters for `filter` over `entity`.
fn where_clause(entity: &'static str, filter: &Filter) -> Result<(String, Vec<Value>)> {
  let mut conds = vec!["entity = ?".to_owned()];
  let mut params = vec![Value::Text(entity.to_owned())];

  for (field, value) in &filter.equals {
    let path = json_path(field)?;
    if *value == FieldValue::Null {
      conds.push(format!("json_extract(body, '{path}') IS NULL"));
    } else {
      conds.push(format!("json_extract(body, '{path}') = ?"));
      params.push(encode_field_value(value));
    }
  }

  if let Some(id) = filter.exclude {
    conds.push("record_id != ?".to_owned());
    params.push(Value::Text(encode_uuid(id)));
  }

  Ok((format!("WHERE {}", conds.join(" AND ")), params))
}

fn order_clause(order_by: &[(String, Direction)]) -> Result<String> {
  if order_by.is_empty() {
    return Ok(String::new());
  }
  let terms = order_by
    .iter()
    .map(|(field, dir)| {
      let dir = match dir {
        Direction::Ascending => "ASC",
        Direction::Descending => "DESC",
      };
      Ok(format!("json_extract(body, '{}') {dir}", json_path(field)?))
    })
    .collect::<Result<Vec<_>>>()?;
  Ok(format!("ORDER BY {}", terms.join(", ")))
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  async fn get<R: Entity>(&self, id: Uuid) -> Result<Option<R>> {
    let id_str = encode_uuid(id);

    let body: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT body FROM records WHERE entity = ?1 AND record_id = ?2",
            rusqlite::params![R::ENTITY, id_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    body.as_deref().map(decode_record::<R>).transpose()
  }

  async fn filter<R: Entity>(&self, query: Query) -> Result<Vec<R>> {
    let (where_sql, params) = where_clause(R::ENTITY, &query.filter)?;
    let order_sql = order_clause(&query.order_by)?;
    let sql = format!("SELECT body FROM records {where_sql} {order_sql}");

    let bodies: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    bodies.iter().map(|b| decode_record::<R>(b)).collect()
  }

  async fn exists<R: Entity>(&self, filter: Filter) -> Result<bool> {
    let (where_sql, params) = where_clause(R::ENTITY, &filter)?;
    let sql = format!("SELECT EXISTS (SELECT 1 FROM records {where_sql})");

    let found = self
      .conn
      .call(move |conn| {
        let found: bool =
          conn.query_row(&sql, rusqlite::params_from_iter(params), |row| row.get(0))?;
        Ok(found)
      })
      .await?;

    Ok(found)
  }

  async fn save<R: Entity>(&self, record: R) -> Result<R> {
    self.write_rows::<R>(vec![RowWrite::prepare(&record)?]).await?;
    Ok(record)
  }

  async fn save_all<R: Entity>(&self, records: Vec<R>) -> Result<Vec<R>> {
    let rows = records
      .iter()
      .map(RowWrite::prepare::<R>)
      .collect::<Result<Vec<_>>>()?;
    self.write_rows::<R>(rows).await?;
    Ok(records)
  }
}
