use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::constants::{DEFAULT_CACHE_VERSION, PRECACHE_URLS};
use crate::error::{Result, WorkerError};

/// What the worker does with the caches it finds
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    /// Normal offline-first caching
    Cache,
    /// Delete every cache and pass all requests straight to the origin
    Purge,
}

impl FromStr for WorkerMode {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cache" => Ok(WorkerMode::Cache),
            "purge" => Ok(WorkerMode::Purge),
            other => Err(WorkerError::Config(format!(
                "WORKER_MODE must be \"cache\" or \"purge\", got {:?}",
                other
            ))),
        }
    }
}

/// Worker configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Storefront the worker sits in front of
    pub origin_url: Url,
    pub cache_dir: PathBuf,
    /// Name of the one cache that survives activation
    pub cache_version: String,
    /// Per-cache limit on stored body bytes
    pub max_cache_size: u64,
    /// Per-cache bytes of responses kept in memory
    pub memory_cache_size: u64,
    pub precache_urls: Vec<String>,
    /// Activate right after install instead of waiting for SKIP_WAITING
    pub skip_waiting: bool,
    pub mode: WorkerMode,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3005,
            origin_url: Url::parse("http://localhost:5000").expect("static URL"),
            cache_dir: PathBuf::from("./cache/worker"),
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            max_cache_size: 256 * 1024 * 1024, // 256MB
            memory_cache_size: 32 * 1024 * 1024, // 32MB
            precache_urls: PRECACHE_URLS.iter().map(|u| u.to_string()).collect(),
            skip_waiting: true,
            mode: WorkerMode::Cache,
            request_timeout_secs: 15,
        }
    }
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let origin_url = match lookup("ORIGIN_URL") {
            Some(raw) => {
                let url = Url::parse(raw.trim())
                    .map_err(|e| WorkerError::Config(format!("ORIGIN_URL: {}", e)))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(WorkerError::Config(
                        "ORIGIN_URL must be an http(s) URL".to_string(),
                    ));
                }
                url
            }
            None => defaults.origin_url,
        };

        let cache_dir = lookup("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let cache_version = lookup("CACHE_VERSION")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.cache_version);

        let max_cache_size = lookup("MAX_CACHE_SIZE")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.max_cache_size);

        let memory_cache_size = lookup("MEMORY_CACHE_SIZE")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.memory_cache_size);

        let precache_urls = lookup("PRECACHE_URLS")
            .map(|s| {
                s.split(',')
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.precache_urls);

        let skip_waiting = lookup("SKIP_WAITING")
            .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
            .unwrap_or(defaults.skip_waiting);

        let mode = match lookup("WORKER_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.mode,
        };

        let request_timeout_secs = lookup("REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.request_timeout_secs);

        Ok(Self {
            port,
            origin_url,
            cache_dir,
            cache_version,
            max_cache_size,
            memory_cache_size,
            precache_urls,
            skip_waiting,
            mode,
            request_timeout_secs,
        })
    }
}
