//! Worker lifecycle: install, activate, fetch, message, push, notification
//! click and background sync, as callbacks of one [`ServiceWorker`] trait

use crate::classify::{choose_strategy, Route};
use crate::config::{Config, WorkerMode};
use crate::constants::{
    LANDING_PATH, NOTIFICATION_BADGE, NOTIFICATION_DEFAULT_BODY, NOTIFICATION_ICON,
    NOTIFICATION_TITLE, NOTIFICATION_VIBRATE, SYNC_CART_TAG, SYNC_FAVORITES_TAG,
};
use crate::error::{Result, WorkerError};
use crate::network::Network;
use crate::strategy::Strategies;
use crate::types::{
    ClickResponse, ClientMessage, FetchOutcome, FetchRequest, MessageReply, Notification,
    NotificationButton, NotificationData,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use request_cache::{CacheStorage, RequestCache};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Where the worker is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to take control
    Installed,
    Activating,
    /// Controlling clients: fetches are intercepted
    Activated,
    /// Install failed; everything passes through
    Redundant,
}

/// Events the hosting platform delivers to a worker
#[async_trait]
pub trait ServiceWorker: Send + Sync {
    async fn install(&self) -> Result<()>;
    async fn activate(&self) -> Result<()>;
    async fn fetch(&self, request: FetchRequest) -> FetchOutcome;
    async fn message(&self, message: ClientMessage) -> Result<Option<MessageReply>>;
    fn push(&self, payload: Option<&str>) -> Notification;
    fn notification_click(&self, action: Option<&str>) -> ClickResponse;
    async fn sync(&self, tag: &str);
}

/// Replays offline cart and favorites changes to the backend
#[async_trait]
pub trait BackgroundSync: Send + Sync {
    async fn sync_cart(&self) -> Result<()>;
    async fn sync_favorites(&self) -> Result<()>;
}

/// [`BackgroundSync`] for deployments without a sync backend
pub struct NoopSync;

#[async_trait]
impl BackgroundSync for NoopSync {
    async fn sync_cart(&self) -> Result<()> {
        debug!("Cart sync requested, no backend configured");
        Ok(())
    }

    async fn sync_favorites(&self) -> Result<()> {
        debug!("Favorites sync requested, no backend configured");
        Ok(())
    }
}

/// The storefront's worker
pub struct StorefrontWorker {
    config: Config,
    storage: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    background_sync: Arc<dyn BackgroundSync>,
    state: RwLock<WorkerState>,
    /// Serializes install and activate
    transition: Mutex<()>,
}

impl StorefrontWorker {
    pub fn new(config: Config, storage: Arc<CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            storage,
            network,
            background_sync: Arc::new(NoopSync),
            state: RwLock::new(WorkerState::Parsed),
            transition: Mutex::new(()),
        }
    }

    pub fn with_background_sync(mut self, background_sync: Arc<dyn BackgroundSync>) -> Self {
        self.background_sync = background_sync;
        self
    }

    pub fn version(&self) -> &str {
        &self.config.cache_version
    }

    pub fn mode(&self) -> WorkerMode {
        self.config.mode
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    /// Install, then activate unless configured to wait for SKIP_WAITING.
    /// Purge mode always activates straight away.
    pub async fn start(&self) -> Result<()> {
        self.install().await?;

        if self.config.skip_waiting || self.config.mode == WorkerMode::Purge {
            self.activate().await
        } else {
            info!(version = %self.config.cache_version, "Installed, waiting for SKIP_WAITING");
            Ok(())
        }
    }

    /// The current-version cache, if it can be opened
    pub async fn current_cache(&self) -> Result<Arc<RequestCache>> {
        Ok(self.storage.open(&self.config.cache_version).await?)
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
    }

    /// Fetch every URL and store them all, or store nothing if any fails
    async fn precache(&self, urls: &[String]) -> Result<usize> {
        let requests = urls
            .iter()
            .map(|u| -> Result<FetchRequest> {
                Ok(FetchRequest::get(self.config.origin_url.join(u)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let fetched = try_join_all(requests.iter().map(|request| async move {
            let response = self.network.fetch(request).await?;
            if !response.is_success() {
                return Err(WorkerError::Network(format!(
                    "{} returned status {}",
                    request.url, response.status
                )));
            }
            Ok((request.key(), response))
        }))
        .await?;

        let cache = self.current_cache().await?;
        cache.add_all(&fetched).await?;
        Ok(fetched.len())
    }

    /// Delete every cache except `keep`, returning the deleted names
    async fn purge_caches(&self, keep: Option<&str>) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.storage.keys().await? {
            if Some(name.as_str()) == keep {
                continue;
            }
            if self.storage.delete(&name).await? {
                debug!(cache = %name, "Deleted cache");
                removed.push(name);
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ServiceWorker for StorefrontWorker {
    async fn install(&self) -> Result<()> {
        let _transition = self.transition.lock().await;
        self.set_state(WorkerState::Installing).await;

        let result = match self.config.mode {
            WorkerMode::Cache => self.precache(&self.config.precache_urls).await,
            WorkerMode::Purge => self.purge_caches(None).await.map(|removed| removed.len()),
        };

        match result {
            Ok(count) => {
                self.set_state(WorkerState::Installed).await;
                info!(
                    version = %self.config.cache_version,
                    mode = ?self.config.mode,
                    count,
                    "Install complete"
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                error!(version = %self.config.cache_version, error = %e, "Install failed");
                Err(WorkerError::Install(e.to_string()))
            }
        }
    }

    async fn activate(&self) -> Result<()> {
        let _transition = self.transition.lock().await;
        match self.state().await {
            WorkerState::Activated => return Ok(()),
            WorkerState::Installed => {}
            other => {
                return Err(WorkerError::InvalidState(format!(
                    "cannot activate while {:?}",
                    other
                )))
            }
        }

        self.set_state(WorkerState::Activating).await;
        let keep = match self.config.mode {
            WorkerMode::Cache => Some(self.config.cache_version.as_str()),
            WorkerMode::Purge => None,
        };

        match self.purge_caches(keep).await {
            Ok(removed) => {
                self.set_state(WorkerState::Activated).await;
                info!(version = %self.config.cache_version, removed = ?removed, "Activated, controlling clients");
                Ok(())
            }
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                error!(error = %e, "Activation failed");
                Err(e)
            }
        }
    }

    async fn fetch(&self, request: FetchRequest) -> FetchOutcome {
        if self.config.mode == WorkerMode::Purge || self.state().await != WorkerState::Activated {
            return FetchOutcome::PassThrough(request);
        }

        let strategy = match choose_strategy(&request) {
            Route::PassThrough => return FetchOutcome::PassThrough(request),
            Route::Intercept(strategy) => strategy,
        };

        let cache = match self.current_cache().await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Cache unavailable, passing request through");
                return FetchOutcome::PassThrough(request);
            }
        };

        let strategies = Strategies::new(
            self.network.clone(),
            cache,
            self.config.origin_url.clone(),
        );
        let response = strategies.respond(strategy, &request).await;
        debug!(url = %request.url, strategy = strategy.as_str(), status = response.status, "Handled fetch");

        FetchOutcome::Respond { response, strategy }
    }

    async fn message(&self, message: ClientMessage) -> Result<Option<MessageReply>> {
        match message {
            ClientMessage::SkipWaiting => {
                let state = self.state().await;
                if state == WorkerState::Installed {
                    self.activate().await?;
                } else {
                    debug!(state = ?state, "SKIP_WAITING ignored");
                }
                Ok(None)
            }
            ClientMessage::GetVersion => Ok(Some(MessageReply {
                version: self.config.cache_version.clone(),
            })),
            ClientMessage::CacheUrls { urls } => {
                if self.config.mode == WorkerMode::Purge {
                    debug!(count = urls.len(), "CACHE_URLS ignored in purge mode");
                    return Ok(None);
                }
                let count = self.precache(&urls).await?;
                info!(count, "Cached URLs on request");
                Ok(None)
            }
        }
    }

    fn push(&self, payload: Option<&str>) -> Notification {
        let body = payload
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(NOTIFICATION_DEFAULT_BODY);

        Notification {
            title: NOTIFICATION_TITLE.to_string(),
            body: body.to_string(),
            icon: NOTIFICATION_ICON.to_string(),
            badge: NOTIFICATION_BADGE.to_string(),
            vibrate: NOTIFICATION_VIBRATE.to_vec(),
            data: NotificationData {
                date_of_arrival: Utc::now().timestamp_millis(),
                primary_key: 1,
            },
            actions: vec![
                NotificationButton {
                    action: "explore".to_string(),
                    title: "View products".to_string(),
                },
                NotificationButton {
                    action: "close".to_string(),
                    title: "Close".to_string(),
                },
            ],
        }
    }

    fn notification_click(&self, action: Option<&str>) -> ClickResponse {
        match action {
            Some("close") => ClickResponse::Dismiss,
            _ => ClickResponse::OpenWindow {
                url: LANDING_PATH.to_string(),
            },
        }
    }

    async fn sync(&self, tag: &str) {
        let result = match tag {
            SYNC_CART_TAG => self.background_sync.sync_cart().await,
            SYNC_FAVORITES_TAG => self.background_sync.sync_favorites().await,
            other => {
                debug!(tag = other, "Ignoring unknown sync tag");
                return;
            }
        };

        if let Err(e) = result {
            error!(tag, error = %e, "Background sync failed");
        }
    }
}
