//! Test doubles shared by the unit tests

use crate::error::{Result, WorkerError};
use crate::network::Network;
use crate::types::FetchRequest;
use async_trait::async_trait;
use request_cache::StoredResponse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Answer from the route table, 404 for unknown URLs
    Serve,
    /// Every fetch fails as if the origin were unreachable
    Fail,
    /// Every fetch never completes
    Hang,
}

pub struct StubNetwork {
    routes: Mutex<HashMap<String, StoredResponse>>,
    behaviour: Mutex<Behaviour>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl StubNetwork {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            behaviour: Mutex::new(behaviour),
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn serve(self, url: &str, response: StoredResponse) -> Self {
        self.route(url, response);
        self
    }

    pub fn route(&self, url: &str, response: StoredResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every URL fetched so far, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<StoredResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap()
            .push(request.url.to_string());
        let behaviour = *self.behaviour.lock().unwrap();
        match behaviour {
            Behaviour::Fail => Err(WorkerError::Network("connection refused".to_string())),
            Behaviour::Hang => std::future::pending().await,
            Behaviour::Serve => Ok(self
                .routes
                .lock()
                .unwrap()
                .get(request.url.as_str())
                .cloned()
                .unwrap_or_else(|| StoredResponse::new(404, b"not found".to_vec()))),
        }
    }
}

pub fn ok(body: &str) -> StoredResponse {
    StoredResponse::new(200, body.as_bytes().to_vec()).with_header("content-type", "text/plain")
}
