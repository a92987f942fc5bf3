use crate::log::DurabilityLog;
use async_trait::async_trait;
use dashmap::DashMap;
use linkstash_core::error::{Result, StorageError};
use linkstash_core::{DeletionEntry, Handle, Stats, Storage, UrlRecord};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, trace, warn};

/// Records kept in a sharded [`DashMap`] keyed by handle, optionally mirrored
/// to an append-only [`DurabilityLog`].
///
/// With a log attached, a save holds the log writer while it updates the map
/// and appends, so concurrent saves of one handle reach the map and the log in
/// the same order and a reopen restores the record the map ended up with.
///
/// Saves always update the map first. When the log append fails afterwards
/// the error is returned but the map keeps the new record, so a running
/// process keeps serving it even though it will not survive a restart.
/// Saving an existing handle replaces the record (last write wins).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    storage: DashMap<Handle, UrlRecord>,
    log: Option<DurabilityLog>,
}

impl MemoryStorage {
    /// Creates a purely in-memory, non-durable storage.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
            log: None,
        }
    }

    /// Creates a storage pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = UrlRecord>) -> Self {
        let storage = Self::new();
        storage.load(records);
        storage
    }

    /// Creates a storage backed by the log file at `path`, replaying
    /// whatever the file already holds.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let log = DurabilityLog::new(path);
        let records = log.replay().await;

        let storage = Self {
            storage: DashMap::with_capacity(records.len()),
            log: Some(log),
        };
        storage.load(records);
        storage
    }

    fn load(&self, records: impl IntoIterator<Item = UrlRecord>) {
        for record in records {
            self.storage.insert(record.handle.clone(), record);
        }
    }

    /// Number of stored records, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_url(&self, original_url: &str, owner: &str, handle: &Handle) -> Result<()> {
        let record = UrlRecord::new(owner, handle.clone(), original_url);
        let mut writer = match &self.log {
            Some(log) => Some(log.writer().await),
            None => None,
        };

        if let Some(previous) = self.storage.insert(handle.clone(), record.clone()) {
            debug!(handle = %handle, previous = %previous.original_url, "overwrote existing handle");
        }

        if let Some(writer) = &mut writer {
            writer.append(&record).await.inspect_err(|err| {
                warn!(handle = %handle, error = %err, "record kept in memory but not logged");
            })?;
        }

        trace!(handle = %handle, owner, "saved url");
        Ok(())
    }

    async fn get_url(&self, handle: &Handle) -> Result<UrlRecord> {
        self.storage
            .get(handle)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(handle.to_string()))
    }

    async fn get_urls_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        Ok(self
            .storage
            .iter()
            .filter(|entry| entry.owner == owner && !entry.deleted)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn is_alive(&self) -> Result<bool> {
        Ok(true)
    }

    async fn batch_save_urls(&self, records: Vec<UrlRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut writer = match &self.log {
            Some(log) => Some(log.writer().await),
            None => None,
        };

        for record in &records {
            self.storage.insert(record.handle.clone(), record.clone());
        }

        if let Some(writer) = &mut writer {
            writer.append_batch(&records).await.inspect_err(|err| {
                warn!(count = records.len(), error = %err, "batch kept in memory but not logged");
            })?;
        }

        trace!(count = records.len(), "saved url batch");
        Ok(())
    }

    async fn delete_urls(&self, entries: Vec<DeletionEntry>) -> Result<()> {
        let mut deleted = 0usize;

        for entry in &entries {
            if let Some(mut record) = self.storage.get_mut(&entry.handle) {
                if entry.matches(&record) && !record.deleted {
                    record.deleted = true;
                    deleted += 1;
                }
            }
        }

        debug!(requested = entries.len(), deleted, "soft-deleted urls");
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let owners: HashSet<String> = self
            .storage
            .iter()
            .map(|entry| entry.owner.clone())
            .collect();

        Ok(Stats {
            owners: owners.len() as u64,
            urls: self.storage.len() as u64,
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
