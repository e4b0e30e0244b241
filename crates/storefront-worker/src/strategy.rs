//! Retrieval strategies
//!
//! Each strategy combines the current cache with the network and always
//! produces a response: network failures end in a cached copy or an offline
//! fallback, never in an error for the requester.

use crate::classify::Strategy;
use crate::network::Network;
use crate::offline::offline_response;
use crate::types::FetchRequest;
use request_cache::{RequestCache, StoredResponse};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Strategy runner bound to one cache and one network
pub struct Strategies {
    network: Arc<dyn Network>,
    cache: Arc<RequestCache>,
    origin: Url,
}

impl Strategies {
    pub fn new(network: Arc<dyn Network>, cache: Arc<RequestCache>, origin: Url) -> Self {
        Self {
            network,
            cache,
            origin,
        }
    }

    pub async fn respond(&self, strategy: Strategy, request: &FetchRequest) -> StoredResponse {
        match strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::NetworkOnly => self.network_only(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    async fn cache_first(&self, request: &FetchRequest) -> StoredResponse {
        if let Some(cached) = self.cache.match_request(&request.key()).await {
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    store(&self.cache, request, &response).await;
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Cache-first miss while offline");
                self.offline(request).await
            }
        }
    }

    async fn network_first(&self, request: &FetchRequest) -> StoredResponse {
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    store(&self.cache, request, &response).await;
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying cache");
                match self.cache.match_request(&request.key()).await {
                    Some(cached) => cached,
                    None => self.offline(request).await,
                }
            }
        }
    }

    async fn network_only(&self, request: &FetchRequest) -> StoredResponse {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network-only request failed");
                self.offline(request).await
            }
        }
    }

    async fn stale_while_revalidate(&self, request: &FetchRequest) -> StoredResponse {
        if let Some(cached) = self.cache.match_request(&request.key()).await {
            // Detached: the requester never waits on or observes this fetch
            tokio::spawn(revalidate(
                self.network.clone(),
                self.cache.clone(),
                request.clone(),
            ));
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    store(&self.cache, request, &response).await;
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Revalidation failed with nothing cached");
                self.offline(request).await
            }
        }
    }

    async fn offline(&self, request: &FetchRequest) -> StoredResponse {
        offline_response(request, &self.cache, &self.origin).await
    }
}

async fn revalidate(network: Arc<dyn Network>, cache: Arc<RequestCache>, request: FetchRequest) {
    match network.fetch(&request).await {
        Ok(response) if response.is_success() => store(&cache, &request, &response).await,
        Ok(response) => {
            debug!(url = %request.url, status = response.status, "Revalidation kept stale entry")
        }
        Err(e) => debug!(url = %request.url, error = %e, "Background revalidation failed"),
    }
}

/// Store a copy of `response`; cache write failures only cost a future hit
async fn store(cache: &RequestCache, request: &FetchRequest, response: &StoredResponse) {
    if let Err(e) = cache.put(&request.key(), response).await {
        warn!(url = %request.url, error = %e, "Failed to cache response");
    }
}
