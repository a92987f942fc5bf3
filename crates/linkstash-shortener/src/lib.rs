//! The linkstash shortening service.
//!
//! [`ShortenerService`] implements [`linkstash_core::Shortener`] over any
//! storage backend. Deletions go through the [`deletion`] pipeline, and
//! [`Runtime`] ties both together with an ordered shutdown.

pub mod deletion;
pub mod runtime;
pub mod service;

pub use deletion::{DeletionConfig, DeletionPipeline, DeletionQueue, DeletionWorker};
pub use runtime::Runtime;
pub use service::{ServiceConfig, ShortenerService};
