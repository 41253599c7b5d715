use crate::error::Result;
use crate::models::Record;

/// A hosted store mirroring the in-memory collections.
///
/// Implementations keep one table per [`crate::models::EntryKind`] and key
/// rows by `id`. Writes are last-writer-wins; there is no conflict detection.
pub trait RemoteStore {
    /// Every entry of kind `E`, newest first.
    async fn fetch_all<E: Record>(&self) -> Result<Vec<E>>;

    /// Insert or replace the row with `entry`'s id.
    async fn upsert<E: Record>(&self, entry: &E) -> Result<()>;

    async fn delete<E: Record>(&self, id: &str) -> Result<()>;

    /// Trivial round trip that keeps an idle connection from being dropped.
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory [`RemoteStore`] double with switchable failures.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::RemoteStore;
    use crate::error::{AppError, Result};
    use crate::models::{Record, format_timestamp};

    #[derive(Debug, Default)]
    pub struct MemoryRemote {
        tables: Mutex<HashMap<&'static str, Vec<Vec<String>>>>,
        failing: AtomicBool,
        hanging: AtomicBool,
        pub writes: AtomicUsize,
        pub deletes: AtomicUsize,
        pub pings: AtomicUsize,
    }

    impl MemoryRemote {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_rows<E: Record>(self, entries: &[E]) -> Self {
            self.tables.lock().unwrap().insert(
                E::KIND.table(),
                entries.iter().map(Record::to_columns).collect(),
            );
            self
        }

        /// Make every call fail until switched back.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Make every call wait forever until switched back.
        pub fn set_hanging(&self, hanging: bool) {
            self.hanging.store(hanging, Ordering::SeqCst);
        }

        pub fn rows<E: Record>(&self) -> Vec<E> {
            self.tables
                .lock()
                .unwrap()
                .get(E::KIND.table())
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|row| E::from_columns(row).unwrap())
                .collect()
        }

        async fn check(&self) -> Result<()> {
            if self.hanging.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(AppError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "remote unavailable",
                )));
            }
            Ok(())
        }
    }

    impl RemoteStore for MemoryRemote {
        async fn fetch_all<E: Record>(&self) -> Result<Vec<E>> {
            self.check().await?;
            let mut entries = self.rows::<E>();
            entries.sort_by_key(|e| std::cmp::Reverse(format_timestamp(e.timestamp())));
            Ok(entries)
        }

        async fn upsert<E: Record>(&self, entry: &E) -> Result<()> {
            self.check().await?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            let mut tables = self.tables.lock().unwrap();
            let rows = tables.entry(E::KIND.table()).or_default();
            let columns = entry.to_columns();
            match rows.iter_mut().find(|row| row[0] == entry.id()) {
                Some(row) => *row = columns,
                None => rows.push(columns),
            }
            Ok(())
        }

        async fn delete<E: Record>(&self, id: &str) -> Result<()> {
            self.check().await?;
            self.deletes.fetch_add(1, Ordering::SeqCst);
            let mut tables = self.tables.lock().unwrap();
            if let Some(rows) = tables.get_mut(E::KIND.table()) {
                rows.retain(|row| row[0] != id);
            }
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            self.check().await?;
            self.pings.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
