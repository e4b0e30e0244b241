// --- Versioning ---

/// Default cache generation; every cache with another name is purged on activation.
pub const DEFAULT_CACHE_VERSION: &str = "storefront-v1";

// --- Install manifest ---

/// Resources fetched and stored as one unit at install. Paths are resolved
/// against the origin; absolute URLs are fetched as-is.
pub const PRECACHE_URLS: &[&str] = &[
    "/",
    "/static/css/style.css",
    "/static/js/img-fallback.js",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
];

/// Cached pages tried, in order, when a document request is offline.
pub const APP_SHELL_PATHS: &[&str] = &["/offline", "/"];

// --- Routing ---

pub const API_PREFIX: &str = "/api/";
pub const STATIC_PREFIX: &str = "/static/";
pub const UNCACHED_PREFIXES: &[&str] = &["/cart/", "/admin/"];

/// Control endpoints live under this prefix and are never proxied.
pub const CONTROL_PREFIX: &str = "/_worker";

// --- Notifications ---

pub const NOTIFICATION_TITLE: &str = "Storefront";
pub const NOTIFICATION_DEFAULT_BODY: &str = "New products available!";
pub const NOTIFICATION_ICON: &str = "/static/icons/icon-192x192.png";
pub const NOTIFICATION_BADGE: &str = "/static/icons/icon-72x72.png";
pub const NOTIFICATION_VIBRATE: &[u32] = &[100, 50, 100];

/// Page opened by the `explore` notification action.
pub const LANDING_PATH: &str = "/";

// --- Background sync tags ---

pub const SYNC_CART_TAG: &str = "sync-cart";
pub const SYNC_FAVORITES_TAG: &str = "sync-favorites";

// --- Limits ---

/// Largest request body forwarded to the origin.
pub const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;
