//! Change detection between two snapshots of a collection.

use std::collections::{HashMap, HashSet};

use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Upsert,
    Delete,
}

/// The single record inferred to have changed between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<E> {
    pub kind: ChangeKind,
    pub affected: E,
}

/// Infer the one record a user action touched.
///
/// A shorter `next` is read as a delete of the first `previous` entry missing
/// from it. Otherwise the first `next` entry that is new, or differs from the
/// `previous` entry with the same id, is an upsert. Only one record is ever
/// reported: when several change at once the rest are dropped. Use
/// [`ChangeSet::between`] when that matters. The app itself mirrors edits
/// through the [`ChangeSet`] returned by [`crate::ledger::Ledger`].
pub fn detect_change<E: Record>(previous: &[E], next: &[E]) -> Option<Change<E>> {
    if next.len() < previous.len() {
        let remaining: HashSet<&str> = next.iter().map(|e| e.id()).collect();
        return previous
            .iter()
            .find(|e| !remaining.contains(e.id()))
            .map(|e| Change {
                kind: ChangeKind::Delete,
                affected: e.clone(),
            });
    }

    let before: HashMap<&str, &E> = previous.iter().map(|e| (e.id(), e)).collect();
    next.iter()
        .find(|&e| before.get(e.id()).is_none_or(|&old| old != e))
        .map(|e| Change {
            kind: ChangeKind::Upsert,
            affected: e.clone(),
        })
}

/// Ids touched by a mutation, grouped by what happened to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn inserted(id: impl Into<String>) -> Self {
        Self {
            inserted: vec![id.into()],
            ..Default::default()
        }
    }

    pub fn updated(id: impl Into<String>) -> Self {
        Self {
            updated: vec![id.into()],
            ..Default::default()
        }
    }

    pub fn deleted(id: impl Into<String>) -> Self {
        Self {
            deleted: vec![id.into()],
            ..Default::default()
        }
    }

    /// Full diff between two snapshots, in `next` order for inserts and
    /// updates and `previous` order for deletes.
    pub fn between<E: Record>(previous: &[E], next: &[E]) -> Self {
        let before: HashMap<&str, &E> = previous.iter().map(|e| (e.id(), e)).collect();
        let after: HashSet<&str> = next.iter().map(|e| e.id()).collect();

        let mut changes = Self::default();
        for entry in next {
            match before.get(entry.id()) {
                None => changes.inserted.push(entry.id().to_string()),
                Some(old) if *old != entry => changes.updated.push(entry.id().to_string()),
                Some(_) => {}
            }
        }
        changes.deleted = previous
            .iter()
            .filter(|e| !after.contains(e.id()))
            .map(|e| e.id().to_string())
            .collect();

        changes
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Ids that must be written to the remote store.
    pub fn upserts(&self) -> impl Iterator<Item = &str> {
        self.inserted
            .iter()
            .chain(self.updated.iter())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExpenseEntry;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn expense(id: &str, amount: Decimal) -> ExpenseEntry {
        ExpenseEntry {
            id: id.to_string(),
            amount,
            note: format!("note {id}"),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap(),
        }
    }

    fn snapshot() -> Vec<ExpenseEntry> {
        vec![
            expense("a", dec!(10)),
            expense("b", dec!(20)),
            expense("c", dec!(30)),
        ]
    }

    #[test]
    fn removing_each_element_is_a_delete_of_that_element() {
        let previous = snapshot();
        for removed in 0..previous.len() {
            let mut next = previous.clone();
            let gone = next.remove(removed);

            let change = detect_change(&previous, &next).unwrap();
            assert_eq!(change.kind, ChangeKind::Delete);
            assert_eq!(change.affected, gone);
        }
    }

    #[test]
    fn appending_is_an_upsert_of_the_new_element() {
        let previous = snapshot();
        let mut next = previous.clone();
        next.push(expense("d", dec!(5)));

        let change = detect_change(&previous, &next).unwrap();
        assert_eq!(change.kind, ChangeKind::Upsert);
        assert_eq!(change.affected.id, "d");
    }

    #[test]
    fn mutating_a_field_is_an_upsert_of_that_element() {
        let previous = snapshot();
        let mut next = previous.clone();
        next[1].note = "new soap".to_string();

        let change = detect_change(&previous, &next).unwrap();
        assert_eq!(change.kind, ChangeKind::Upsert);
        assert_eq!(change.affected, next[1]);
    }

    #[test]
    fn identical_snapshots_have_no_change() {
        assert_eq!(detect_change(&snapshot(), &snapshot()), None);
        assert_eq!(detect_change::<ExpenseEntry>(&[], &[]), None);
    }

    #[test]
    fn only_the_first_of_several_changes_is_reported() {
        let previous = snapshot();
        let mut next = previous.clone();
        next[0].amount = dec!(11);
        next[2].amount = dec!(33);

        let change = detect_change(&previous, &next).unwrap();
        assert_eq!(change.affected.id, "a");
    }

    #[test]
    fn change_set_between_reports_every_change() {
        let previous = snapshot();
        let mut next = previous.clone();
        next.remove(0);
        next[0].amount = dec!(21);
        next.push(expense("d", dec!(1)));
        next.push(expense("e", dec!(2)));

        let changes = ChangeSet::between(&previous, &next);
        assert_eq!(changes.inserted, vec!["d", "e"]);
        assert_eq!(changes.updated, vec!["b"]);
        assert_eq!(changes.deleted, vec!["a"]);
        assert_eq!(changes.upserts().collect::<Vec<_>>(), vec!["d", "e", "b"]);
    }

    #[test]
    fn change_set_between_equal_snapshots_is_empty() {
        assert!(ChangeSet::between(&snapshot(), &snapshot()).is_empty());
    }
}
