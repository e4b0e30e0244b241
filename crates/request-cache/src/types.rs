//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of a cached request: upper-cased method plus absolute URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    /// Key for a GET request, the only kind the worker ever stores
    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    /// Hex SHA-256 of the request identity, used as the on-disk file stem
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{} {}", self.method, self.url).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Snapshot of an HTTP response as held by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StoredResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup returning the first match
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Metadata for a cached entry, persisted next to its body file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: RequestKey,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub(crate) fn into_response(self, body: Vec<u8>) -> StoredResponse {
        StoredResponse {
            status: self.status,
            headers: self.headers,
            body,
        }
    }
}

/// Statistics about a single named cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
