//! HTTP host for the worker
//!
//! Every request outside `/_worker` runs through [`ServiceWorker::fetch`];
//! pass-through requests are forwarded to the origin untouched. The
//! `/_worker` routes carry lifecycle events: health, messages, push,
//! notification clicks, background sync and placeholder images.

use crate::constants::{CONTROL_PREFIX, MAX_REQUEST_BODY};
use crate::error::WorkerError;
use crate::lifecycle::{ServiceWorker, StorefrontWorker};
use crate::network::{is_hop_by_hop, Network};
use crate::types::{ClientMessage, FetchOutcome, FetchRequest, HealthResponse};
use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use placeholder_svg::Placeholder;
use request_cache::StoredResponse;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use url::Url;

/// Shared state for the HTTP server
pub struct ServerState {
    pub worker: StorefrontWorker,
    /// Used for pass-through requests
    pub network: Arc<dyn Network>,
    pub origin: Url,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(worker: StorefrontWorker, network: Arc<dyn Network>, origin: Url) -> Self {
        Self {
            worker,
            network,
            origin,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct ClickRequest {
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceholderQuery {
    width: Option<u32>,
    height: Option<u32>,
    label: Option<String>,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    let control = Router::new()
        .route("/health", get(health))
        .route("/message", post(message))
        .route("/push", post(push))
        .route("/notificationclick", post(notification_click))
        .route("/sync/{tag}", post(sync))
        .route("/placeholder.svg", get(placeholder))
        .layer(CorsLayer::permissive());

    Router::new()
        .nest(CONTROL_PREFIX, control)
        .fallback(intercept)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let worker = &state.worker;
    let caches = worker.storage().keys().await.unwrap_or_default();
    let cache = match worker.current_cache().await {
        Ok(cache) => Some(cache.stats().await),
        Err(_) => None,
    };
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: worker.version().to_string(),
        state: worker.state().await,
        mode: worker.mode(),
        uptime_secs,
        caches,
        cache,
    })
}

/// Control message from a page
async fn message(
    State(state): State<SharedState>,
    Json(message): Json<ClientMessage>,
) -> Response {
    match state.worker.message(message).await {
        Ok(Some(reply)) => Json(reply).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(error = %e, "Message handling failed");
            let status = match e {
                WorkerError::InvalidState(_) => StatusCode::CONFLICT,
                _ => StatusCode::BAD_GATEWAY,
            };
            error_response(status, &e.to_string())
        }
    }
}

/// Push message; the body is the optional notification text
async fn push(State(state): State<SharedState>, body: String) -> Response {
    let payload = Some(body.as_str()).filter(|b| !b.is_empty());
    Json(state.worker.push(payload)).into_response()
}

async fn notification_click(
    State(state): State<SharedState>,
    Json(click): Json<ClickRequest>,
) -> Response {
    Json(state.worker.notification_click(click.action.as_deref())).into_response()
}

async fn sync(State(state): State<SharedState>, Path(tag): Path<String>) -> StatusCode {
    state.worker.sync(&tag).await;
    StatusCode::ACCEPTED
}

async fn placeholder(Query(query): Query<PlaceholderQuery>) -> Response {
    let svg = Placeholder::new(query.width, query.height, query.label.as_deref()).to_svg();
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        svg,
    )
        .into_response()
}

/// Run a proxied request through the worker
async fn intercept(State(state): State<SharedState>, request: Request) -> Response {
    let request = match to_fetch_request(&state.origin, request).await {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected request");
            let status = match e {
                WorkerError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return error_response(status, &e.to_string());
        }
    };

    match state.worker.fetch(request).await {
        FetchOutcome::Respond { response, strategy } => {
            let mut response = to_response(response);
            response.headers_mut().insert(
                HeaderName::from_static("x-worker-strategy"),
                HeaderValue::from_static(strategy.as_str()),
            );
            response
        }
        FetchOutcome::PassThrough(request) => match state.network.fetch(&request).await {
            Ok(response) => to_response(response),
            Err(e) => {
                warn!(method = %request.method, url = %request.url, error = %e, "Origin unavailable");
                error_response(StatusCode::BAD_GATEWAY, "Origin unavailable")
            }
        },
    }
}

/// Build the worker's view of an incoming request.
///
/// Only the path and query of the target are used; the URL always points at
/// the configured origin, whatever scheme or authority the client sent.
async fn to_fetch_request(origin: &Url, request: Request) -> Result<FetchRequest, WorkerError> {
    let (parts, body) = request.into_parts();

    let mut url = origin.clone();
    match parts.uri.path_and_query() {
        Some(target) => {
            url.set_path(target.path());
            url.set_query(target.query());
        }
        None => {
            url.set_path("/");
            url.set_query(None);
        }
    }
    url.set_fragment(None);

    let method = Method::from_bytes(parts.method.as_str().as_bytes())
        .map_err(|e| WorkerError::BadRequest(format!("Invalid method: {}", e)))?;

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = read_body(body, MAX_REQUEST_BODY).await?;

    Ok(FetchRequest {
        method,
        url,
        headers,
        body,
    })
}

async fn read_body(body: Body, limit: usize) -> Result<Vec<u8>, WorkerError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| WorkerError::BadRequest(format!("Failed to read request body: {}", e)))?;
        if buf.len() + chunk.len() > limit {
            return Err(WorkerError::BodyTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn to_response(stored: StoredResponse) -> Response {
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(stored.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &stored.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    response
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{ok, Behaviour, StubNetwork};
    use axum::http::Request as HttpRequest;
    use request_cache::CacheStorage;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const ORIGIN: &str = "http://shop.test";

    async fn create_test_state(
        dir: &TempDir,
        network: StubNetwork,
        start: bool,
    ) -> (SharedState, Arc<StubNetwork>) {
        let config = Config {
            origin_url: Url::parse(ORIGIN).unwrap(),
            cache_dir: dir.path().to_path_buf(),
            cache_version: "shop-v3".to_string(),
            precache_urls: vec!["/".to_string()],
            ..Config::default()
        };
        let storage = Arc::new(CacheStorage::new(config.cache_dir.clone(), 1024 * 1024, 100));
        let network = Arc::new(network);
        let worker = StorefrontWorker::new(config, storage, network.clone());
        if start {
            worker.start().await.unwrap();
        }
        let state = Arc::new(ServerState::new(
            worker,
            network.clone(),
            Url::parse(ORIGIN).unwrap(),
        ));
        (state, network)
    }

    fn site() -> StubNetwork {
        StubNetwork::new(Behaviour::Serve).serve("http://shop.test/", ok("home"))
    }

    async fn body_string(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = create_test_state(&dir, site(), true).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/_worker/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], "shop-v3");
        assert_eq!(json["state"], "activated");
        assert_eq!(json["cache"]["entries"], 1);
    }

    #[tokio::test]
    async fn test_get_version_message() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = create_test_state(&dir, site(), false).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/_worker/message")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"GET_VERSION"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"version":"shop-v3"}"#);
    }

    #[tokio::test]
    async fn test_skip_waiting_before_install_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = create_test_state(&dir, site(), false).await;
        let router = create_router(state.clone());

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/_worker/message")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"SKIP_WAITING"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        // Never installed, so there is nothing to activate
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            state.worker.state().await,
            crate::lifecycle::WorkerState::Parsed
        );
    }

    #[tokio::test]
    async fn test_proxied_page_is_intercepted() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = create_test_state(&dir, site(), true).await;
        let router = create_router(state);

        let response = router
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["x-worker-strategy"],
            "stale-while-revalidate"
        );
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(body_string(response).await, "home");
    }

    #[tokio::test]
    async fn test_offline_api_returns_503() {
        let dir = tempfile::tempdir().unwrap();
        let (state, network) = create_test_state(&dir, site(), true).await;
        network.set_behaviour(Behaviour::Fail);
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/orders")
                    .header("accept", "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["x-worker-strategy"], "network-first");
    }

    #[tokio::test]
    async fn test_post_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let (state, network) = create_test_state(&dir, site(), true).await;
        network.route("http://shop.test/cart/add", ok("added"));
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/cart/add")
                    .body(Body::from("id=3"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-worker-strategy").is_none());
        assert_eq!(body_string(response).await, "added");
    }

    #[tokio::test]
    async fn test_pass_through_failure_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let (state, network) = create_test_state(&dir, site(), true).await;
        network.set_behaviour(Behaviour::Fail);
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("DELETE")
                    .uri("/admin/produtos/4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    fn site_with_foreign_host() -> StubNetwork {
        site()
            .serve("http://evil.test/secret", ok("internal data"))
            .serve("http://shop.test//evil.test/secret", ok("shop page"))
            .serve("http://shop.test/secret", ok("shop secret page"))
    }

    #[tokio::test]
    async fn test_scheme_relative_path_stays_on_origin() {
        let dir = tempfile::tempdir().unwrap();
        let (state, network) = create_test_state(&dir, site_with_foreign_host(), true).await;
        let router = create_router(state.clone());

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("//evil.test/secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "shop page");
        assert!(network
            .requested()
            .iter()
            .all(|url| url.starts_with("http://shop.test/")));

        let cache = state.worker.current_cache().await.unwrap();
        assert!(cache
            .keys()
            .await
            .iter()
            .all(|key| key.url.starts_with("http://shop.test/")));
    }

    #[tokio::test]
    async fn test_absolute_form_target_stays_on_origin() {
        let dir = tempfile::tempdir().unwrap();
        let (state, network) = create_test_state(&dir, site_with_foreign_host(), true).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("http://evil.test/secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "shop secret page");
        assert!(!network.requested().iter().any(|url| url.contains("evil.test")));
    }

    #[tokio::test]
    async fn test_oversized_request_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (state, network) = create_test_state(&dir, site(), true).await;
        let calls_before = network.calls();
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/cart/add")
                    .body(Body::from(vec![b'x'; MAX_REQUEST_BODY + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(network.calls(), calls_before);
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let body = read_body(Body::from("id=3"), 4).await.unwrap();
        assert_eq!(body, b"id=3");
        assert!(matches!(
            read_body(Body::from("id=34"), 4).await,
            Err(WorkerError::BodyTooLarge { limit: 4 })
        ));
    }

    #[tokio::test]
    async fn test_push_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = create_test_state(&dir, site(), false).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/_worker/push")
                    .body(Body::from("Nova coleção"))
                    .unwrap(),
            )
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["title"], "Storefront");
        assert_eq!(json["body"], "Nova coleção");
        assert_eq!(json["actions"][0]["action"], "explore");
        assert!(json["data"]["dateOfArrival"].as_i64().is_some());
    }

    #[tokio::test]
    async fn test_notification_click_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = create_test_state(&dir, site(), false).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/_worker/notificationclick")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"action":"close"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(response).await, r#"{"action":"dismiss"}"#);
    }

    #[tokio::test]
    async fn test_sync_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = create_test_state(&dir, site(), false).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/_worker/sync/sync-cart")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_placeholder_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = create_test_state(&dir, site(), false).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/_worker/placeholder.svg?width=120&height=80&label=Bon%C3%A9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["content-type"], "image/svg+xml");
        let svg = body_string(response).await;
        assert!(svg.contains(r#"width="120" height="80""#));
        assert!(svg.contains(">Boné</text>"));
    }
}
