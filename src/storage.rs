use std::future::Future;
use std::time::Duration;

use crate::diff::ChangeSet;
use crate::error::{AppError, Result};
use crate::fallback::LocalStore;
use crate::models::Record;
use crate::remote::RemoteStore;

/// Storage adapter: a best-effort remote mirror in front of a local snapshot.
///
/// Reads prefer the remote store and fall back to the local snapshot on any
/// failure. Writes always land locally first; remote writes are attempted once
/// and only logged when they fail. The next refresh is the only recovery.
#[derive(Debug)]
pub struct Storage<R> {
    remote: Option<R>,
    local: LocalStore,
    remote_timeout: Duration,
}

impl<R: RemoteStore> Storage<R> {
    pub fn new(remote: Option<R>, local: LocalStore, remote_timeout: Duration) -> Self {
        Self {
            remote,
            local,
            remote_timeout,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.remote_timeout, call)
            .await
            .map_err(|_| AppError::Timeout(self.remote_timeout))?
    }

    pub async fn fetch_all<E: Record>(&self) -> Vec<E> {
        let table = E::KIND.table();
        if let Some(remote) = &self.remote {
            match self.bounded(remote.fetch_all::<E>()).await {
                Ok(entries) => {
                    tracing::debug!(table, count = entries.len(), "Fetched from remote");
                    return entries;
                }
                Err(e) => {
                    tracing::error!(table, error = %e, "Remote fetch failed, using local snapshot");
                }
            }
        }
        self.load_local()
    }

    fn load_local<E: Record>(&self) -> Vec<E> {
        let key = E::KIND.local_key();
        let raw = match self.local.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!(key, error = %e, "Could not read local snapshot");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Discarding corrupt local snapshot");
            Vec::new()
        })
    }

    fn save_local<E: Record>(&self, all: &[E]) -> Result<()> {
        self.local
            .set(E::KIND.local_key(), &serde_json::to_string(all)?)
    }

    /// Write `all` locally, then mirror the single `affected` entry remotely.
    ///
    /// Pairs with [`crate::diff::detect_change`]. Ledger edits in the app go
    /// through [`Storage::sync_changes`] instead.
    pub async fn persist<E: Record>(
        &self,
        all: &[E],
        affected: Option<&E>,
        is_delete: bool,
    ) -> Result<()> {
        self.save_local(all)?;

        if let (Some(remote), Some(entry)) = (&self.remote, affected) {
            if is_delete {
                self.remote_delete::<E>(remote, entry.id()).await;
            } else {
                self.remote_upsert(remote, entry).await;
            }
        }
        Ok(())
    }

    /// Write `all` locally, then mirror every id in `changes` remotely.
    pub async fn sync_changes<E: Record>(&self, all: &[E], changes: &ChangeSet) -> Result<()> {
        self.save_local(all)?;

        let Some(remote) = &self.remote else {
            return Ok(());
        };
        for id in changes.upserts() {
            match all.iter().find(|e| e.id() == id) {
                Some(entry) => self.remote_upsert(remote, entry).await,
                None => tracing::warn!(table = E::KIND.table(), id, "Changed id not in snapshot"),
            }
        }
        for id in &changes.deleted {
            self.remote_delete::<E>(remote, id).await;
        }
        Ok(())
    }

    async fn remote_upsert<E: Record>(&self, remote: &R, entry: &E) {
        let table = E::KIND.table();
        match self.bounded(remote.upsert(entry)).await {
            Ok(()) => tracing::debug!(table, id = entry.id(), "Upserted remotely"),
            Err(e) => tracing::error!(table, id = entry.id(), error = %e, "Remote upsert failed"),
        }
    }

    async fn remote_delete<E: Record>(&self, remote: &R, id: &str) {
        let table = E::KIND.table();
        match self.bounded(remote.delete::<E>(id)).await {
            Ok(()) => tracing::debug!(table, id, "Deleted remotely"),
            Err(e) => tracing::error!(table, id, error = %e, "Remote delete failed"),
        }
    }

    /// Keep the remote connection warm. `false` when there is no remote or it
    /// did not answer.
    pub async fn ping(&self) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };
        match self.bounded(remote.ping()).await {
            Ok(()) => {
                tracing::debug!("Heartbeat: remote connection alive");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Heartbeat failed");
                false
            }
        }
    }
}

#[cfg(test)]
impl<R: RemoteStore> Storage<R> {
    pub fn remote(&self) -> Option<&R> {
        self.remote.as_ref()
    }

    pub fn local_snapshot<E: Record>(&self) -> Vec<E> {
        self.load_local()
    }
}
