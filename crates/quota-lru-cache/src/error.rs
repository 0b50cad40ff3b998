//! Error types for the quota-aware cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// The backing storage area reported a failure
    Storage(String),
    /// A write would exceed a total or per-item storage quota
    QuotaExceeded {
        scope: String,
        bytes: u64,
        limit: u64,
    },
    Serialization(String),
    Io(Box<std::io::Error>),
    Config(String),
    /// The namespace worker task is no longer running
    QueueClosed(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Storage(msg) => write!(f, "Storage error: {}", msg),
            CacheError::QuotaExceeded {
                scope,
                bytes,
                limit,
            } => write!(
                f,
                "Quota exceeded for {}: {} bytes over limit of {} bytes",
                scope, bytes, limit
            ),
            CacheError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CacheError::QueueClosed(namespace) => {
                write!(f, "Namespace queue closed: {}", namespace)
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
