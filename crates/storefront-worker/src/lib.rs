//! Storefront offline worker
//!
//! An offline-first caching proxy that sits in front of the storefront and
//! plays the part of its service worker: requests are classified by path and
//! served cache-first, network-first, network-only or
//! stale-while-revalidate from a single versioned cache, with synthesized
//! offline responses when both cache and origin are unavailable.

pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod network;
pub mod offline;
pub mod server;
pub mod strategy;
pub mod types;

pub use classify::{choose_strategy, classify, RequestClass, Route, Strategy};
pub use config::{Config, WorkerMode};
pub use error::{Result, WorkerError};
pub use lifecycle::{BackgroundSync, NoopSync, ServiceWorker, StorefrontWorker, WorkerState};
pub use network::{HttpNetwork, Network};
pub use types::{ClickResponse, ClientMessage, ContentKind, FetchOutcome, FetchRequest, MessageReply, Notification};

#[cfg(test)]
mod testing;
