mod cli;

use crate::cli::{LogFormat, CLI};
use anyhow::Context;
use clap::Parser;
use linkstash_shortener::{DeletionConfig, Runtime, ServiceConfig};
use linkstash_storage::{Backend, Storage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    let backend = Backend::from_options(
        config.database_dsn.clone(),
        config.file_storage_path.clone(),
    );
    info!(
        base_url = %config.base_url,
        backend = %backend,
        log_format = %config.log_format,
        storage_timeout = ?config.storage_timeout(),
        deletion_batch_size = config.deletion_batch_size,
        deletion_flush_interval = ?config.deletion_flush_interval(),
        "starting shortener"
    );

    let storage = backend.open().await;
    info!(storage = storage.kind(), "storage ready");
    if !storage.is_alive().await.unwrap_or(false) {
        error!(storage = storage.kind(), "storage failed its liveness check");
    }

    let service_config = ServiceConfig::builder()
        .base_url(config.base_url.clone())
        .storage_timeout(config.storage_timeout())
        .build();
    let deletion_config = DeletionConfig::builder()
        .batch_size(config.deletion_batch_size)
        .flush_interval(config.deletion_flush_interval())
        .build();
    let runtime = Runtime::start(Arc::new(storage), service_config, deletion_config);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    tokio::time::timeout(SHUTDOWN_TIMEOUT, runtime.shutdown())
        .await
        .context("shutdown timed out")?
        .context("failed to close storage")?;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
