use crate::deletion::{DeletionConfig, DeletionPipeline, DeletionWorker};
use crate::service::{ServiceConfig, ShortenerService};
use linkstash_core::{Storage, StorageError};
use std::sync::Arc;
use tracing::info;

/// A running shortener: the service, its deletion pipeline and the storage
/// they share.
pub struct Runtime<S: Storage> {
    service: Arc<ShortenerService<S>>,
    storage: Arc<S>,
    deletion_worker: DeletionWorker,
}

impl<S: Storage> Runtime<S> {
    /// Spawns the deletion pipeline and builds the service around `storage`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        storage: Arc<S>,
        service_config: ServiceConfig,
        deletion_config: DeletionConfig,
    ) -> Self {
        let (queue, deletion_worker) = DeletionPipeline::spawn(storage.clone(), deletion_config);
        let service = Arc::new(ShortenerService::new(storage.clone(), queue, service_config));

        Self {
            service,
            storage,
            deletion_worker,
        }
    }

    pub fn service(&self) -> Arc<ShortenerService<S>> {
        self.service.clone()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Flushes pending deletions, then closes the storage.
    ///
    /// Deletion requests made after this point fail with `ShuttingDown`.
    pub async fn shutdown(self) -> Result<(), StorageError> {
        info!("stopping deletion pipeline");
        self.deletion_worker.shutdown().await;

        info!("closing storage");
        self.storage.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use linkstash_core::error::Result;
    use linkstash_core::{DeletionEntry, Handle, Shortener, ShortenerError, Stats, UrlRecord};
    use linkstash_storage::MemoryStorage;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Memory storage that records the order of deletes and closes.
    #[derive(Default)]
    struct EventStorage {
        inner: MemoryStorage,
        events: Mutex<Vec<String>>,
    }

    impl EventStorage {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Storage for EventStorage {
        async fn save_url(&self, original_url: &str, owner: &str, handle: &Handle) -> Result<()> {
            self.inner.save_url(original_url, owner, handle).await
        }

        async fn get_url(&self, handle: &Handle) -> Result<UrlRecord> {
            self.inner.get_url(handle).await
        }

        async fn get_urls_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
            self.inner.get_urls_by_owner(owner).await
        }

        async fn is_alive(&self) -> Result<bool> {
            Ok(true)
        }

        async fn batch_save_urls(&self, records: Vec<UrlRecord>) -> Result<()> {
            self.inner.batch_save_urls(records).await
        }

        async fn delete_urls(&self, entries: Vec<DeletionEntry>) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push(format!("delete {}", entries.len()));
            self.inner.delete_urls(entries).await
        }

        async fn stats(&self) -> Result<Stats> {
            self.inner.stats().await
        }

        async fn close(&self) -> Result<()> {
            self.events.lock().unwrap().push("close".to_string());
            Ok(())
        }
    }

    fn long_interval() -> DeletionConfig {
        DeletionConfig::builder()
            .batch_size(100)
            .flush_interval(Duration::from_secs(3600))
            .build()
    }

    #[tokio::test]
    async fn shutdown_flushes_deletions_before_closing_storage() {
        let storage = Arc::new(EventStorage::default());
        let runtime = Runtime::start(storage.clone(), ServiceConfig::default(), long_interval());
        let service = runtime.service();

        service.shorten("https://youtube.com", "user1").await.unwrap();
        service
            .request_deletion("user1", vec![Handle::new_unchecked("e62e2446")])
            .unwrap();

        runtime.shutdown().await.unwrap();

        assert_eq!(storage.events(), vec!["delete 1", "close"]);
        let record = storage
            .get_url(&Handle::new_unchecked("e62e2446"))
            .await
            .unwrap();
        assert!(record.deleted);
    }

    #[tokio::test]
    async fn shutdown_without_pending_deletions_only_closes() {
        let storage = Arc::new(EventStorage::default());
        let runtime = Runtime::start(storage.clone(), ServiceConfig::default(), long_interval());

        runtime.shutdown().await.unwrap();

        assert_eq!(storage.events(), vec!["close"]);
    }

    #[tokio::test]
    async fn service_rejects_deletions_after_shutdown() {
        let runtime = Runtime::start(
            Arc::new(MemoryStorage::new()),
            ServiceConfig::default(),
            DeletionConfig::default(),
        );
        let service = runtime.service();
        assert_eq!(runtime.storage().len(), 0);

        runtime.shutdown().await.unwrap();

        let err = service
            .request_deletion("user1", vec![Handle::new_unchecked("e62e2446")])
            .unwrap_err();
        assert_eq!(err, ShortenerError::ShuttingDown);
    }
}
