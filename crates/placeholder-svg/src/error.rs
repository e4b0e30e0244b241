//! Error types for image elements

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    /// The element is no longer part of a document
    Detached,
    Rejected(String),
}

impl fmt::Display for ElementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementError::Detached => write!(f, "Element is detached"),
            ElementError::Rejected(msg) => write!(f, "Element rejected update: {}", msg),
        }
    }
}

impl std::error::Error for ElementError {}

pub type Result<T> = std::result::Result<T, ElementError>;
