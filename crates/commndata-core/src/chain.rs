//! Temporal chain maintenance.
//!
//! Given the record being saved and the other live rows of its chain, works
//! out the record's own `end_date` and which neighbors need their `end_date`
//! rewritten. Planning is pure; the service stamps and persists the result.
//!
//! Soft-deleted rows never take part: they are not neighbors and never
//! receive cascade writes.

use chrono::NaiveDate;

use crate::temporal::{Temporal, day_before};

/// Rows immediately before and after a start date.
#[derive(Debug)]
pub struct Neighbours<'a, R> {
  pub older: Option<&'a R>,
  pub newer: Option<&'a R>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChainMaintainer;

impl ChainMaintainer {
  /// Predecessor and successor of `start` within `chain`, which must be
  /// ordered by `start_date`.
  pub fn neighbours<'a, R: Temporal>(
    &self,
    chain: &'a [R],
    start: NaiveDate,
  ) -> Neighbours<'a, R> {
    Neighbours {
      older: chain.iter().rev().find(|r| r.start_date() < start),
      newer: chain.iter().find(|r| r.start_date() > start),
    }
  }

  /// The first row of `chain` starting strictly after `since`.
  pub fn newer_than<'a, R: Temporal>(&self, chain: &'a [R], since: NaiveDate) -> Option<&'a R> {
    chain.iter().find(|r| r.start_date() > since)
  }

  /// Set `record.end_date` and return the neighbors whose `end_date` must
  /// change, already updated but not yet stamped.
  ///
  /// `chain` holds the live rows sharing `record`'s identity key, ordered by
  /// `start_date`, without `record` itself. `original` is the persisted
  /// version of `record`, if any; when the edit moves or deletes the row, the
  /// row that preceded its old position is relinked to its new successor.
  pub fn plan<R: Temporal>(&self, record: &mut R, original: Option<&R>, chain: &[R]) -> Vec<R> {
    let chain: Vec<R> = chain.iter().filter(|r| r.id() != record.id()).cloned().collect();
    let start = record.start_date();
    let in_chain = !record.envelope().delete_flag;
    let mut cascades = Vec::new();

    let Neighbours { older, newer } = self.neighbours(&chain, start);
    let older = older.filter(|_| in_chain);

    if in_chain {
      record.validity_mut().end_date = newer.map(|r| day_before(r.start_date()));
      if let Some(older) = older {
        push_if_changed(&mut cascades, older, Some(day_before(start)));
      }
    }

    let vacated = original
      .filter(|o| !o.envelope().delete_flag)
      .map(|o| o.start_date())
      .filter(|old_start| !in_chain || *old_start != start);

    if let Some(old_start) = vacated
      && let Some(p) = chain.iter().rposition(|r| r.start_date() < old_start)
      && older.is_none_or(|o| o.id() != chain[p].id())
    {
      let prev_start = chain[p].start_date();
      let mut successor = chain.get(p + 1).map(|r| r.start_date());
      if in_chain && start > prev_start && successor.is_none_or(|s| start < s) {
        successor = Some(start);
      }
      push_if_changed(&mut cascades, &chain[p], successor.map(day_before));
    }

    cascades
  }
}

fn push_if_changed<R: Temporal>(out: &mut Vec<R>, row: &R, end_date: Option<NaiveDate>) {
  if row.validity().end_date != end_date {
    let mut row = row.clone();
    row.validity_mut().end_date = end_date;
    out.push(row);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::code::CodeMaster;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn row(start: NaiveDate, end: Option<NaiveDate>) -> CodeMaster {
    let mut r = CodeMaster::new("COLOR", "RED", "Red", start);
    r.validity.end_date = end;
    r
  }

  #[test]
  fn first_row_is_open_ended() {
    let mut a = row(date(2024, 1, 1), None);
    let cascades = ChainMaintainer.plan(&mut a, None, &[]);
    assert!(cascades.is_empty());
    assert_eq!(a.validity.end_date, None);
  }

  #[test]
  fn appending_closes_predecessor() {
    let a = row(date(2024, 1, 1), None);
    let mut b = row(date(2024, 6, 1), None);

    let cascades = ChainMaintainer.plan(&mut b, None, std::slice::from_ref(&a));

    assert_eq!(b.validity.end_date, None);
    assert_eq!(cascades.len(), 1);
    assert_eq!(cascades[0].id, a.id);
    assert_eq!(cascades[0].validity.end_date, Some(date(2024, 5, 31)));
  }

  #[test]
  fn inserting_between_rows_links_both_sides() {
    let a = row(date(2024, 1, 1), Some(date(2024, 5, 31)));
    let b = row(date(2024, 6, 1), None);
    let mut c = row(date(2024, 3, 1), None);

    let cascades = ChainMaintainer.plan(&mut c, None, &[a.clone(), b.clone()]);

    assert_eq!(c.validity.end_date, Some(date(2024, 5, 31)));
    assert_eq!(cascades.len(), 1);
    assert_eq!(cascades[0].id, a.id);
    assert_eq!(cascades[0].validity.end_date, Some(date(2024, 2, 29)));
  }

  #[test]
  fn prepending_leaves_successor_alone() {
    let b = row(date(2024, 6, 1), None);
    let mut a = row(date(2024, 1, 1), None);

    let cascades = ChainMaintainer.plan(&mut a, None, std::slice::from_ref(&b));

    assert!(cascades.is_empty());
    assert_eq!(a.validity.end_date, Some(date(2024, 5, 31)));
  }

  #[test]
  fn unchanged_resave_writes_no_neighbours() {
    let a = row(date(2024, 1, 1), Some(date(2024, 5, 31)));
    let b = row(date(2024, 6, 1), None);
    let mut edited = b.clone();
    edited.name = "Crimson".into();

    let cascades = ChainMaintainer.plan(&mut edited, Some(&b), &[a]);

    assert!(cascades.is_empty());
    assert_eq!(edited.validity.end_date, None);
  }

  #[test]
  fn record_is_never_its_own_neighbour() {
    let a = row(date(2024, 1, 1), None);
    let mut moved = a.clone();
    moved.validity.start_date = date(2024, 2, 1);

    let cascades = ChainMaintainer.plan(&mut moved, Some(&a), std::slice::from_ref(&a));

    assert!(cascades.is_empty());
    assert_eq!(moved.validity.end_date, None);
  }

  #[test]
  fn deleting_tail_reopens_predecessor() {
    let a = row(date(2024, 1, 1), Some(date(2024, 5, 31)));
    let b = row(date(2024, 6, 1), None);
    let mut deleted = b.clone();
    deleted.audit.delete_flag = true;

    let cascades = ChainMaintainer.plan(&mut deleted, Some(&b), std::slice::from_ref(&a));

    assert_eq!(cascades.len(), 1);
    assert_eq!(cascades[0].id, a.id);
    assert_eq!(cascades[0].validity.end_date, None);
  }

  #[test]
  fn moving_tail_before_predecessor_relinks_the_gap() {
    let a = row(date(2024, 1, 1), Some(date(2024, 5, 31)));
    let b = row(date(2024, 6, 1), None);
    let mut moved = b.clone();
    moved.validity.start_date = date(2023, 7, 1);

    let cascades = ChainMaintainer.plan(&mut moved, Some(&b), std::slice::from_ref(&a));

    assert_eq!(moved.validity.end_date, Some(date(2023, 12, 31)));
    assert_eq!(cascades.len(), 1);
    assert_eq!(cascades[0].id, a.id);
    assert_eq!(cascades[0].validity.end_date, None);
  }

  #[test]
  fn neighbours_pick_nearest_rows() {
    let chain = vec![
      row(date(2024, 1, 1), None),
      row(date(2024, 3, 1), None),
      row(date(2024, 6, 1), None),
    ];
    let n = ChainMaintainer.neighbours(&chain, date(2024, 4, 1));
    assert_eq!(n.older.unwrap().validity.start_date, date(2024, 3, 1));
    assert_eq!(n.newer.unwrap().validity.start_date, date(2024, 6, 1));
    assert!(ChainMaintainer.newer_than(&chain, date(2024, 6, 1)).is_none());
  }
}
