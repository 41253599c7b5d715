use crate::diff::ChangeSet;
use crate::error::{AppError, Result};
use crate::models::Record;

/// In-memory collection of one entry kind. This is what the views render;
/// the stores only mirror it.
#[derive(Debug, Clone)]
pub struct Ledger<E> {
    entries: Vec<E>,
}

impl<E> Default for Ledger<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: Record> Ledger<E> {
    pub fn new(entries: Vec<E>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Overwrite everything with a fresh snapshot from the store.
    pub fn replace_all(&mut self, entries: Vec<E>) {
        self.entries = entries;
    }

    pub fn insert(&mut self, entry: E) -> ChangeSet {
        let changes = ChangeSet::inserted(entry.id());
        self.entries.push(entry);
        changes
    }

    pub fn update(&mut self, entry: E) -> Result<ChangeSet> {
        let slot = self
            .entries
            .iter_mut()
            .find(|e| e.id() == entry.id())
            .ok_or_else(|| AppError::EntryNotFound(entry.id().to_string()))?;

        if *slot == entry {
            return Ok(ChangeSet::default());
        }
        let changes = ChangeSet::updated(entry.id());
        *slot = entry;
        Ok(changes)
    }

    pub fn remove(&mut self, id: &str) -> Result<ChangeSet> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| AppError::EntryNotFound(id.to_string()))?;

        self.entries.remove(index);
        Ok(ChangeSet::deleted(id))
    }

    pub fn newest_first(&self) -> Vec<&E> {
        let mut sorted: Vec<&E> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        sorted
    }

    /// Entries matching `term`, newest first. An empty term matches all.
    pub fn search(&self, term: &str) -> Vec<&E> {
        let term = term.trim();
        self.newest_first()
            .into_iter()
            .filter(|e| term.is_empty() || e.matches(term))
            .collect()
    }
}
