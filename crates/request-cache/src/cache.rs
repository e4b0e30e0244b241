//! A single named cache with in-memory metadata and file-based storage

use crate::error::{CacheError, Result};
use crate::types::{CacheEntry, CacheStats, RequestKey, StoredResponse};
use chrono::Utc;
use moka::future::Cache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const BODY_EXT: &str = "body";
const META_EXT: &str = "json";

/// Named response cache backed by one directory.
///
/// Entries are keyed by the digest of their [`RequestKey`]; each one is a
/// `<digest>.body` file plus a `<digest>.json` metadata file, so a cache
/// reopened after a restart sees everything written before it.
pub struct RequestCache {
    name: String,
    dir: PathBuf,
    /// Metadata for every entry on disk, keyed by digest
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Recently served snapshots, bounded by their weight in bytes
    hot: Cache<String, StoredResponse>,
    max_size: u64,
    current_size: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RequestCache {
    /// Open the cache directory, creating it if needed, and load existing metadata
    pub(crate) async fn load(
        name: &str,
        dir: PathBuf,
        max_size: u64,
        hot_capacity_bytes: u64,
    ) -> Result<Self> {
        fs::create_dir_all(&dir).await?;

        let mut entries = HashMap::new();
        let mut total = 0u64;
        let mut listing = fs::read_dir(&dir).await?;
        while let Some(item) = listing.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            let Some(digest) = path.file_stem().and_then(|s| s.to_str()).map(String::from)
            else {
                continue;
            };

            match read_entry(&path).await {
                Ok(entry) => {
                    if fs::try_exists(body_path(&dir, &digest)).await.unwrap_or(false) {
                        total += entry.size;
                        entries.insert(digest, entry);
                    } else {
                        warn!(cache = name, digest = %digest, "Metadata without body, dropping entry");
                        let _ = fs::remove_file(&path).await;
                    }
                }
                Err(e) => {
                    warn!(cache = name, digest = %digest, error = %e, "Unreadable cache metadata, dropping entry");
                    let _ = fs::remove_file(&path).await;
                    let _ = fs::remove_file(body_path(&dir, &digest)).await;
                }
            }
        }

        info!(cache = name, entries = entries.len(), total_size = total, "Cache opened");

        Ok(Self {
            name: name.to_string(),
            dir,
            entries: RwLock::new(entries),
            hot: Cache::builder()
                .weigher(|_digest: &String, response: &StoredResponse| weigh(response))
                .max_capacity(hot_capacity_bytes)
                .build(),
            max_size,
            current_size: AtomicU64::new(total),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the stored response for a request
    pub async fn match_request(&self, key: &RequestKey) -> Option<StoredResponse> {
        let digest = key.digest();

        if let Some(response) = self.hot.get(&digest).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache = %self.name, url = %key.url, "Cache hit (memory)");
            return Some(response);
        }

        let entry = {
            let entries = self.entries.read().await;
            entries.get(&digest).cloned()
        };

        if let Some(entry) = entry {
            match fs::read(body_path(&self.dir, &digest)).await {
                Ok(body) => {
                    let response = entry.into_response(body);
                    self.hot.insert(digest, response.clone()).await;
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = %self.name, url = %key.url, "Cache hit");
                    return Some(response);
                }
                Err(e) => {
                    warn!(cache = %self.name, url = %key.url, error = %e, "Failed to read cached body, removing entry");
                    self.remove(&digest).await;
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a copy of `response` under `key`, replacing any previous entry
    pub async fn put(&self, key: &RequestKey, response: &StoredResponse) -> Result<()> {
        let digest = key.digest();
        let size = response.body.len() as u64;
        if size > self.max_size {
            return Err(CacheError::TooLarge {
                size,
                max: self.max_size,
            });
        }

        self.remove(&digest).await;
        self.evict_if_needed(size).await;

        let entry = CacheEntry {
            key: key.clone(),
            status: response.status,
            headers: response.headers.clone(),
            size,
            created_at: Utc::now(),
        };

        fs::write(body_path(&self.dir, &digest), &response.body).await?;
        fs::write(meta_path(&self.dir, &digest), serde_json::to_vec(&entry)?).await?;

        {
            let mut entries = self.entries.write().await;
            if let Some(previous) = entries.insert(digest.clone(), entry) {
                self.current_size.fetch_sub(previous.size, Ordering::Relaxed);
            }
        }
        self.current_size.fetch_add(size, Ordering::Relaxed);
        self.hot.insert(digest, response.clone()).await;

        debug!(cache = %self.name, url = %key.url, size, "Cached response");
        Ok(())
    }

    /// Store several responses as a unit.
    ///
    /// Sizes are checked before anything is written; if a write still fails,
    /// the entries this call already stored are removed again.
    pub async fn add_all(&self, responses: &[(RequestKey, StoredResponse)]) -> Result<()> {
        for (_, response) in responses {
            let size = response.body.len() as u64;
            if size > self.max_size {
                return Err(CacheError::TooLarge {
                    size,
                    max: self.max_size,
                });
            }
        }

        let mut written: Vec<String> = Vec::with_capacity(responses.len());
        for (key, response) in responses {
            if let Err(e) = self.put(key, response).await {
                warn!(cache = %self.name, url = %key.url, error = %e, "Batch store failed, rolling back");
                for digest in &written {
                    self.remove(digest).await;
                }
                return Err(e);
            }
            written.push(key.digest());
        }
        Ok(())
    }

    /// Remove the entry for a request, returning whether one existed
    pub async fn delete(&self, key: &RequestKey) -> bool {
        self.remove(&key.digest()).await
    }

    /// Keys of all stored entries, oldest first
    pub async fn keys(&self) -> Vec<RequestKey> {
        let entries = self.entries.read().await;
        let mut all: Vec<&CacheEntry> = entries.values().collect();
        all.sort_by_key(|e| e.created_at);
        all.into_iter().map(|e| e.key.clone()).collect()
    }

    /// Evict oldest entries until there's enough room for new_size bytes
    async fn evict_if_needed(&self, new_size: u64) {
        let current = self.current_size.load(Ordering::Relaxed);

        if current + new_size <= self.max_size {
            return;
        }

        let target_size = self.max_size.saturating_sub(new_size);

        loop {
            let current = self.current_size.load(Ordering::Relaxed);
            if current <= target_size {
                break;
            }

            let oldest = {
                let entries = self.entries.read().await;
                entries
                    .iter()
                    .min_by_key(|(_, e)| e.created_at)
                    .map(|(k, _)| k.clone())
            };

            match oldest {
                Some(digest) => {
                    self.remove(&digest).await;
                    debug!(cache = %self.name, digest = %digest, "Evicted oldest cache entry");
                }
                None => break,
            }
        }
    }

    async fn remove(&self, digest: &str) -> bool {
        let entry = {
            let mut entries = self.entries.write().await;
            entries.remove(digest)
        };
        self.hot.invalidate(digest).await;

        match entry {
            Some(entry) => {
                self.current_size.fetch_sub(entry.size, Ordering::Relaxed);
                // Missing files are fine here
                let _ = fs::remove_file(body_path(&self.dir, digest)).await;
                let _ = fs::remove_file(meta_path(&self.dir, digest)).await;
                true
            }
            None => false,
        }
    }

    /// Drop the memory tier; called when the backing directory is deleted
    pub(crate) fn forget(&self) {
        self.hot.invalidate_all();
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            entries: entries.len(),
            total_size: self.current_size.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Memory-tier weight: body plus header bytes, saturating at `u32::MAX`
fn weigh(response: &StoredResponse) -> u32 {
    let headers: usize = response
        .headers
        .iter()
        .map(|(name, value)| name.len() + value.len())
        .sum();
    (response.body.len() + headers).try_into().unwrap_or(u32::MAX)
}

fn body_path(dir: &Path, digest: &str) -> PathBuf {
    dir.join(format!("{}.{}", digest, BODY_EXT))
}

fn meta_path(dir: &Path, digest: &str) -> PathBuf {
    dir.join(format!("{}.{}", digest, META_EXT))
}

async fn read_entry(path: &Path) -> Result<CacheEntry> {
    let raw = fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}
