//! Registry of named caches under one root directory

use crate::cache::RequestCache;
use crate::error::{CacheError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// All named caches of one deployment.
///
/// Each name is a subdirectory of `root`. Opening the same name twice, even
/// concurrently, yields the same shared [`RequestCache`].
pub struct CacheStorage {
    root: PathBuf,
    max_size: u64,
    hot_capacity: u64,
    open: RwLock<HashMap<String, Arc<RequestCache>>>,
}

impl CacheStorage {
    /// `max_size` bounds the on-disk bytes of each cache, `hot_capacity` the
    /// bytes of snapshots each cache keeps in memory
    pub fn new(root: PathBuf, max_size: u64, hot_capacity: u64) -> Self {
        Self {
            root,
            max_size,
            hot_capacity,
            open: RwLock::new(HashMap::new()),
        }
    }

    /// Ensure the root directory exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        info!(root = ?self.root, "Cache storage initialized");
        Ok(())
    }

    /// Open (creating if needed) the cache called `name`
    pub async fn open(&self, name: &str) -> Result<Arc<RequestCache>> {
        validate_name(name)?;

        if let Some(cache) = self.open.read().await.get(name) {
            return Ok(cache.clone());
        }

        // Re-check under the write lock so concurrent opens share one handle
        let mut open = self.open.write().await;
        if let Some(cache) = open.get(name) {
            return Ok(cache.clone());
        }

        let cache = Arc::new(
            RequestCache::load(name, self.root.join(name), self.max_size, self.hot_capacity)
                .await?,
        );
        open.insert(name.to_string(), cache.clone());
        Ok(cache)
    }

    /// Whether a cache called `name` exists
    pub async fn has(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        if self.open.read().await.contains_key(name) {
            return Ok(true);
        }
        Ok(fs::metadata(self.root.join(name))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    /// Names of all caches, sorted
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.open.read().await.keys().cloned().collect();

        match fs::read_dir(&self.root).await {
            Ok(mut listing) => {
                while let Some(item) = listing.next_entry().await? {
                    if !item.file_type().await?.is_dir() {
                        continue;
                    }
                    if let Some(name) = item.file_name().to_str() {
                        if validate_name(name).is_ok() {
                            names.push(name.to_string());
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Delete the cache called `name` and everything in it, returning whether it existed
    pub async fn delete(&self, name: &str) -> Result<bool> {
        validate_name(name)?;

        let handle = self.open.write().await.remove(name);
        if let Some(cache) = &handle {
            cache.forget();
        }

        let existed = match fs::remove_dir_all(self.root.join(name)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => handle.is_some(),
            Err(e) => return Err(e.into()),
        };

        if existed {
            debug!(cache = name, "Deleted cache");
        }
        Ok(existed)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidName(name.to_string()))
    }
}
