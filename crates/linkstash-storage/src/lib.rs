//! Storage backends for linkstash.
//!
//! [`MemoryStorage`] keeps records in a concurrent map, optionally mirrored to
//! an append-only [`log`]. [`PgStorage`] keeps them in PostgreSQL.
//! [`Backend`] picks one of them at startup and yields an [`AnyStorage`].

pub mod backend;
pub mod log;
pub mod memory;
pub mod postgres;

pub use backend::{AnyStorage, Backend};
pub use linkstash_core::{DeletionEntry, Stats, Storage, StorageError, UrlRecord};
pub use memory::MemoryStorage;
pub use postgres::{PgStorage, PgStorageConfig};
