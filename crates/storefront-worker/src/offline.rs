//! Responses synthesized when neither cache nor network can answer

use crate::constants::APP_SHELL_PATHS;
use crate::types::{ContentKind, FetchRequest};
use placeholder_svg::Placeholder;
use request_cache::{RequestCache, RequestKey, StoredResponse};
use tracing::debug;
use url::Url;

const OFFLINE_IMAGE_SIZE: u32 = 200;
const OFFLINE_IMAGE_LABEL: &str = "Offline";

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Offline</title>
  <style>
    body { font-family: Arial, sans-serif; background: #f8f9fa; color: #333;
           display: flex; align-items: center; justify-content: center;
           min-height: 100vh; margin: 0; text-align: center; }
    button { margin-top: 1rem; padding: .6rem 1.4rem; border: 0; border-radius: 4px;
             background: #333; color: #fff; font-size: 1rem; cursor: pointer; }
  </style>
</head>
<body>
  <main>
    <h1>You are offline</h1>
    <p>Check your connection. The page will reload as soon as you are back online.</p>
    <button type="button" onclick="location.reload()">Try again</button>
  </main>
  <script>window.addEventListener('online', function () { location.reload(); });</script>
</body>
</html>
"#;

/// Best offline answer for `request`: a cached app shell or static page for
/// documents, a placeholder for images, 503 for anything else
pub async fn offline_response(
    request: &FetchRequest,
    cache: &RequestCache,
    origin: &Url,
) -> StoredResponse {
    match request.content_kind() {
        ContentKind::Document => {
            for path in APP_SHELL_PATHS {
                let Ok(url) = origin.join(path) else {
                    continue;
                };
                if let Some(shell) = cache.match_request(&RequestKey::get(url.as_str())).await {
                    debug!(url = %request.url, shell = %url, "Serving cached app shell offline");
                    return shell;
                }
            }
            offline_page()
        }
        ContentKind::Image => offline_image(),
        ContentKind::Other => service_unavailable(),
    }
}

/// Static offline page with a retry button and reload on reconnect
pub fn offline_page() -> StoredResponse {
    StoredResponse::new(200, OFFLINE_PAGE.as_bytes().to_vec())
        .with_header("content-type", "text/html; charset=utf-8")
        .with_header("cache-control", "no-store")
}

/// Small SVG placeholder for images
pub fn offline_image() -> StoredResponse {
    let svg = Placeholder::new(
        Some(OFFLINE_IMAGE_SIZE),
        Some(OFFLINE_IMAGE_SIZE),
        Some(OFFLINE_IMAGE_LABEL),
    )
    .to_svg();
    StoredResponse::new(200, svg.into_bytes())
        .with_header("content-type", "image/svg+xml")
        .with_header("cache-control", "no-store")
}

pub fn service_unavailable() -> StoredResponse {
    StoredResponse::new(503, br#"{"error":"offline"}"#.to_vec())
        .with_header("content-type", "application/json")
        .with_header("cache-control", "no-store")
}
