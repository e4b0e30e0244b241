//! Core types for the storefront worker

use crate::classify::Strategy;
use crate::config::WorkerMode;
use crate::lifecycle::WorkerState;
use request_cache::{CacheStats, RequestKey, StoredResponse};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico"];

/// A request seen by the worker
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Cache identity of this request
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.as_str(), self.url.as_str())
    }

    /// What kind of content the requester expects back
    pub fn content_kind(&self) -> ContentKind {
        let destination = self.header("sec-fetch-dest").unwrap_or_default();
        let accept = self.header("accept").unwrap_or_default();

        if destination == "document" || accept.contains("text/html") {
            return ContentKind::Document;
        }
        if destination == "image" || accept.starts_with("image/") {
            return ContentKind::Image;
        }

        let extension = self
            .url
            .path()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match extension {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => ContentKind::Image,
            _ => ContentKind::Other,
        }
    }
}

/// Expected content of a response, used to shape offline fallbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Document,
    Image,
    Other,
}

/// Result of running a request through the worker
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host forwards it untouched
    PassThrough(FetchRequest),
    Respond {
        response: StoredResponse,
        strategy: Strategy,
    },
}

/// Control message posted to the worker by a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    SkipWaiting,
    GetVersion,
    CacheUrls {
        #[serde(default)]
        urls: Vec<String>,
    },
}

/// Reply to a [`ClientMessage::GetVersion`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReply {
    pub version: String,
}

/// Notification shown for a push message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Milliseconds since the Unix epoch
    pub date_of_arrival: i64,
    pub primary_key: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationButton {
    pub action: String,
    pub title: String,
}

/// What to do after the user clicks a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickResponse {
    OpenWindow { url: String },
    Dismiss,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub state: WorkerState,
    pub mode: WorkerMode,
    pub uptime_secs: u64,
    pub caches: Vec<String>,
    pub cache: Option<CacheStats>,
}
