use crate::error::Result;
use crate::handle::Handle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A stored short link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Anonymous identifier of the client that created the link.
    pub owner: String,
    /// The short handle, unique across all records.
    pub handle: Handle,
    /// The original URL that was shortened.
    pub original_url: String,
    /// Soft-delete marker. Set by the deletion pipeline, never unset.
    #[serde(default)]
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates a live (not deleted) record.
    pub fn new(owner: impl Into<String>, handle: Handle, original_url: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            handle,
            original_url: original_url.into(),
            deleted: false,
        }
    }
}

/// A pending request to soft-delete one of an owner's links.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeletionEntry {
    pub owner: String,
    pub handle: Handle,
}

impl DeletionEntry {
    pub fn new(owner: impl Into<String>, handle: Handle) -> Self {
        Self {
            owner: owner.into(),
            handle,
        }
    }

    /// Whether this entry targets the given record.
    pub fn matches(&self, record: &UrlRecord) -> bool {
        record.owner == self.owner && record.handle == self.handle
    }
}

/// Aggregate counters reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Number of distinct owners.
    pub owners: u64,
    /// Number of records, soft-deleted ones included.
    pub urls: u64,
}

/// The contract every storage backend satisfies.
///
/// Backends own the durable record set. Callers are expected to validate URLs
/// before saving; backends store what they are given.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Persists one record keyed by `handle`.
    ///
    /// Backends enforcing handle uniqueness return
    /// `Err(StorageError::AlreadyExists)` when the handle is taken.
    async fn save_url(&self, original_url: &str, owner: &str, handle: &Handle) -> Result<()>;

    /// Retrieves the record for a handle, soft-deleted or not.
    /// Returns `Err(StorageError::NotFound)` if the handle is unknown.
    async fn get_url(&self, handle: &Handle) -> Result<UrlRecord>;

    /// Returns every record of `owner` that is not soft-deleted.
    async fn get_urls_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>>;

    /// Liveness probe.
    async fn is_alive(&self) -> Result<bool>;

    /// Saves many records as one logical operation.
    async fn batch_save_urls(&self, records: Vec<UrlRecord>) -> Result<()>;

    /// Sets the deleted flag on every record matching an entry's owner and
    /// handle. Entries matching nothing are ignored.
    async fn delete_urls(&self, entries: Vec<DeletionEntry>) -> Result<()>;

    /// Counts distinct owners and records.
    async fn stats(&self) -> Result<Stats>;

    /// Releases held connections. Calling it more than once is harmless.
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_entry_requires_owner_and_handle() {
        let record = UrlRecord::new("user1", Handle::new_unchecked("e62e2446"), "https://youtube.com");

        assert!(DeletionEntry::new("user1", Handle::new_unchecked("e62e2446")).matches(&record));
        assert!(!DeletionEntry::new("user2", Handle::new_unchecked("e62e2446")).matches(&record));
        assert!(!DeletionEntry::new("user1", Handle::new_unchecked("00000000")).matches(&record));
    }

    #[test]
    fn record_without_deleted_field_decodes_as_live() {
        let record: UrlRecord = serde_json::from_str(
            r#"{"owner":"user1","handle":"e62e2446","original_url":"https://youtube.com"}"#,
        )
        .unwrap();
        assert!(!record.deleted);
    }
}
