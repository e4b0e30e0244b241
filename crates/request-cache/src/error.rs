//! Error types for the request cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    Io(Box<std::io::Error>),
    Serialization(String),
    InvalidName(String),
    TooLarge { size: u64, max: u64 },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            CacheError::InvalidName(name) => write!(f, "Invalid cache name: {:?}", name),
            CacheError::TooLarge { size, max } => {
                write!(f, "Response of {} bytes exceeds cache limit of {} bytes", size, max)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
