//! Error types for the cache prune tool

use quota_lru_cache::CacheError;
use std::fmt;

#[derive(Debug)]
pub enum PruneToolError {
    Cache(CacheError),
    Config(String),
}

impl fmt::Display for PruneToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruneToolError::Cache(err) => write!(f, "Cache error: {}", err),
            PruneToolError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for PruneToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PruneToolError::Cache(err) => Some(err),
            PruneToolError::Config(_) => None,
        }
    }
}

impl From<CacheError> for PruneToolError {
    fn from(err: CacheError) -> Self {
        PruneToolError::Cache(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for PruneToolError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        PruneToolError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PruneToolError>;
