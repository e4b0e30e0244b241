//! Request classification and strategy selection
//!
//! Pure functions, evaluated before any I/O.

use crate::constants::{API_PREFIX, STATIC_PREFIX, UNCACHED_PREFIXES};
use crate::types::FetchRequest;
use reqwest::Method;
use serde::Serialize;

/// Kind of resource a path addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Api,
    StaticAsset,
    DynamicUncached,
    Page,
}

/// How a request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    NetworkOnly,
    StaleWhileRevalidate,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::NetworkOnly => "network-only",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

impl From<RequestClass> for Strategy {
    fn from(class: RequestClass) -> Self {
        match class {
            RequestClass::Api => Strategy::NetworkFirst,
            RequestClass::StaticAsset => Strategy::CacheFirst,
            RequestClass::DynamicUncached => Strategy::NetworkOnly,
            RequestClass::Page => Strategy::StaleWhileRevalidate,
        }
    }
}

/// Dispatch decision for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Left alone: forwarded to the network as-is
    PassThrough,
    Intercept(Strategy),
}

/// Classify a URL path by prefix
pub fn classify(path: &str) -> RequestClass {
    if path.starts_with(API_PREFIX) {
        RequestClass::Api
    } else if path.starts_with(STATIC_PREFIX) {
        RequestClass::StaticAsset
    } else if UNCACHED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        RequestClass::DynamicUncached
    } else {
        RequestClass::Page
    }
}

/// Pick the route for a request: non-GET and non-HTTP(S) requests pass
/// through, everything else gets the strategy of its class
pub fn choose_strategy(request: &FetchRequest) -> Route {
    if request.method != Method::GET {
        return Route::PassThrough;
    }
    if !matches!(request.url.scheme(), "http" | "https") {
        return Route::PassThrough;
    }
    Route::Intercept(classify(request.url.path()).into())
}
