//! Core types and traits for the linkstash URL shortener.
//!
//! This crate provides the types shared by the storage backends and the
//! shortener service: handles, records, the [`Storage`] contract and the
//! error taxonomy.

pub mod error;
pub mod handle;
pub mod hash;
pub mod shortener;
pub mod storage;

pub use error::{ShortenerError, StorageError};
pub use handle::Handle;
pub use hash::compute_handle;
pub use shortener::{BatchUrlRequest, BatchUrlResponse, Shortener, UserUrl};
pub use storage::{DeletionEntry, Stats, Storage, UrlRecord};
