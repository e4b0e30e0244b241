//! Named, file-backed response cache keyed by request
//!
//! A [`CacheStorage`] owns a directory of named caches. Each [`RequestCache`]
//! maps a request identity (method + URL) to a stored response snapshot,
//! persisting bodies and metadata on disk with a bounded in-memory hot tier
//! and oldest-first eviction once the size limit is reached.

mod cache;
mod error;
mod storage;
mod types;

pub use cache::RequestCache;
pub use error::{CacheError, Result};
pub use storage::CacheStorage;
pub use types::{CacheEntry, CacheStats, RequestKey, StoredResponse};
