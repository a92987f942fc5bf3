use clap::{Parser, ValueEnum};
use linkstash_shortener::deletion::DEFAULT_BATCH_SIZE;
use linkstash_shortener::service::DEFAULT_BASE_URL;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const STORAGE_TIMEOUT_ENV: &str = "STORAGE_TIMEOUT_SECS";
pub const DELETION_BATCH_SIZE_ENV: &str = "DELETION_BATCH_SIZE";
pub const DELETION_FLUSH_INTERVAL_ENV: &str = "DELETION_FLUSH_INTERVAL_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DELETION_FLUSH_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "pretty")]
    Pretty,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "linkstash-shortener")]
pub struct CLI {
    /// Prefix of every short URL.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Append-only log that keeps the in-memory backend across restarts.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    /// PostgreSQL connection string. Takes precedence over the file log.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    #[arg(long, env = STORAGE_TIMEOUT_ENV, default_value_t = DEFAULT_STORAGE_TIMEOUT_SECS)]
    pub storage_timeout_secs: u64,

    #[arg(long, env = DELETION_BATCH_SIZE_ENV, default_value_t = DEFAULT_BATCH_SIZE)]
    pub deletion_batch_size: usize,

    #[arg(
        long,
        env = DELETION_FLUSH_INTERVAL_ENV,
        default_value_t = DEFAULT_DELETION_FLUSH_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub deletion_flush_interval_secs: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl CLI {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    pub fn deletion_flush_interval(&self) -> Duration {
        Duration::from_secs(self.deletion_flush_interval_secs)
    }
}
