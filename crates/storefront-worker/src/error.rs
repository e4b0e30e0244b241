//! Error types for the storefront worker

use std::fmt;

#[derive(Debug)]
pub enum WorkerError {
    Cache(request_cache::CacheError),
    Http(Box<reqwest::Error>),
    /// Origin answered, but not with something we can use
    Network(String),
    Install(String),
    InvalidState(String),
    InvalidUrl(String),
    /// Incoming request the worker cannot forward
    BadRequest(String),
    BodyTooLarge { limit: usize },
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Cache(err) => write!(f, "Cache error: {}", err),
            WorkerError::Http(err) => write!(f, "HTTP error: {}", err),
            WorkerError::Network(msg) => write!(f, "Network error: {}", msg),
            WorkerError::Install(msg) => write!(f, "Install failed: {}", msg),
            WorkerError::InvalidState(msg) => write!(f, "Invalid worker state: {}", msg),
            WorkerError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            WorkerError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            WorkerError::BodyTooLarge { limit } => {
                write!(f, "Request body exceeds {} bytes", limit)
            }
            WorkerError::Io(err) => write!(f, "IO error: {}", err),
            WorkerError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Cache(err) => Some(err),
            WorkerError::Http(err) => Some(err.as_ref()),
            WorkerError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<request_cache::CacheError> for WorkerError {
    fn from(err: request_cache::CacheError) -> Self {
        WorkerError::Cache(err)
    }
}

impl From<reqwest::Error> for WorkerError {
    fn from(err: reqwest::Error) -> Self {
        WorkerError::Http(Box::new(err))
    }
}

impl From<url::ParseError> for WorkerError {
    fn from(err: url::ParseError) -> Self {
        WorkerError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        WorkerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for WorkerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        WorkerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
