use crate::error::ShortenerError;
use crate::handle::Handle;
use crate::storage::{Stats, UrlRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, ShortenerError>;

/// One element of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUrlRequest {
    /// Client supplied token echoed back in the response.
    pub correlation_id: String,
    pub original_url: String,
}

/// One element of a batch shorten response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUrlResponse {
    pub correlation_id: String,
    pub short_url: String,
}

/// A link as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    pub short_url: String,
    pub original_url: String,
}

/// The operations the transport layer calls.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `original_url` on behalf of `owner` and returns the full short URL.
    ///
    /// Returns `Err(Conflict)` carrying the existing short URL when the
    /// backend already holds the handle.
    async fn shorten(&self, original_url: &str, owner: &str) -> Result<String>;

    /// Resolves a handle to its stored record. Soft-deleted records are
    /// returned with `deleted` set so the caller can report them as gone.
    async fn resolve(&self, handle: &Handle) -> Result<UrlRecord>;

    /// Lists the live links of `owner`.
    async fn list_urls(&self, owner: &str) -> Result<Vec<UserUrl>>;

    /// Shortens many URLs at once. Entries with invalid URLs are skipped.
    async fn shorten_batch(
        &self,
        owner: &str,
        batch: Vec<BatchUrlRequest>,
    ) -> Result<Vec<BatchUrlResponse>>;

    /// Fails unless the storage backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Counts owners and stored links.
    async fn stats(&self) -> Result<Stats>;

    /// Schedules soft deletion of `owner`'s `handles` and returns without
    /// waiting for storage.
    fn request_deletion(&self, owner: &str, handles: Vec<Handle>) -> Result<()>;
}
