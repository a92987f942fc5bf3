use crate::deletion::DeletionQueue;
use async_trait::async_trait;
use linkstash_core::{
    compute_handle, BatchUrlRequest, BatchUrlResponse, Handle, Shortener, ShortenerError, Stats,
    Storage, StorageError, UrlRecord, UserUrl,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceConfig {
    /// Prefix of every short URL handed out.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    /// Upper bound for a single storage call.
    #[builder(default = DEFAULT_STORAGE_TIMEOUT)]
    pub storage_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The [`Shortener`] implementation on top of a [`Storage`] backend.
///
/// Single links get a handle derived from the URL itself (see
/// [`compute_handle`]), so shortening the same URL twice yields the same short
/// URL. Batch entries use the client's correlation id as their handle.
/// Deletions are handed to the deletion pipeline and never touch storage on
/// the caller's task.
#[derive(Debug)]
pub struct ShortenerService<S: ?Sized> {
    storage: Arc<S>,
    deletions: DeletionQueue,
    config: ServiceConfig,
}

impl<S: Storage + ?Sized> ShortenerService<S> {
    pub fn new(storage: Arc<S>, deletions: DeletionQueue, config: ServiceConfig) -> Self {
        Self {
            storage,
            deletions,
            config,
        }
    }

    /// Accepts absolute URLs with a host.
    fn validate_url(url: &str) -> Result<(), ShortenerError> {
        let parsed =
            Url::parse(url).map_err(|e| ShortenerError::InvalidUrl(format!("{url}: {e}")))?;

        if !parsed.has_host() {
            return Err(ShortenerError::InvalidUrl(format!(
                "{url}: url must have a host"
            )));
        }

        Ok(())
    }

    fn short_url(&self, handle: &Handle) -> String {
        handle.to_url(&self.config.base_url)
    }

    /// Runs a storage call under the configured timeout.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>> + Send,
    {
        let limit = self.config.storage_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout = ?limit, "storage call timed out");
                Err(StorageError::Timeout(format!(
                    "{operation} exceeded {limit:?}"
                )))
            }
        }
    }

    /// Turns a handle collision into a conflict carrying the existing short URL.
    fn conflict_or(&self, err: StorageError) -> ShortenerError {
        match err {
            StorageError::AlreadyExists(handle) => ShortenerError::Conflict {
                short_url: self.short_url(&Handle::new_unchecked(handle)),
            },
            other => other.into(),
        }
    }
}

#[async_trait]
impl<S: Storage + ?Sized> Shortener for ShortenerService<S> {
    async fn shorten(&self, original_url: &str, owner: &str) -> Result<String, ShortenerError> {
        Self::validate_url(original_url)?;

        let handle = compute_handle(original_url);
        self.bounded("save_url", self.storage.save_url(original_url, owner, &handle))
            .await
            .map_err(|e| self.conflict_or(e))?;

        debug!(owner, handle = %handle, "shortened url");
        Ok(self.short_url(&handle))
    }

    async fn resolve(&self, handle: &Handle) -> Result<UrlRecord, ShortenerError> {
        Ok(self.bounded("get_url", self.storage.get_url(handle)).await?)
    }

    async fn list_urls(&self, owner: &str) -> Result<Vec<UserUrl>, ShortenerError> {
        let records = self
            .bounded("get_urls_by_owner", self.storage.get_urls_by_owner(owner))
            .await?;

        Ok(records
            .into_iter()
            .map(|record| UserUrl {
                short_url: self.short_url(&record.handle),
                original_url: record.original_url,
            })
            .collect())
    }

    async fn shorten_batch(
        &self,
        owner: &str,
        batch: Vec<BatchUrlRequest>,
    ) -> Result<Vec<BatchUrlResponse>, ShortenerError> {
        let mut records = Vec::with_capacity(batch.len());
        let mut responses = Vec::with_capacity(batch.len());

        for request in batch {
            // The client's correlation id doubles as the handle.
            let handle = match Self::validate_url(&request.original_url)
                .and_then(|()| Handle::new(request.correlation_id.as_str()))
            {
                Ok(handle) => handle,
                Err(err) => {
                    debug!(correlation_id = %request.correlation_id, error = %err, "skipping batch entry");
                    continue;
                }
            };

            responses.push(BatchUrlResponse {
                correlation_id: request.correlation_id,
                short_url: self.short_url(&handle),
            });
            records.push(UrlRecord::new(owner, handle, request.original_url));
        }

        if records.is_empty() {
            return Ok(responses);
        }

        let count = records.len();
        self.bounded("batch_save_urls", self.storage.batch_save_urls(records))
            .await
            .map_err(|e| self.conflict_or(e))?;

        debug!(owner, count, "shortened batch");
        Ok(responses)
    }

    async fn ping(&self) -> Result<(), ShortenerError> {
        if self.bounded("is_alive", self.storage.is_alive()).await? {
            Ok(())
        } else {
            Err(StorageError::Unavailable("storage reported not alive".to_string()).into())
        }
    }

    async fn stats(&self) -> Result<Stats, ShortenerError> {
        Ok(self.bounded("stats", self.storage.stats()).await?)
    }

    fn request_deletion(&self, owner: &str, handles: Vec<Handle>) -> Result<(), ShortenerError> {
        self.deletions.request_deletion(owner, handles)
    }
}
