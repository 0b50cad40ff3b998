//! Storage area abstraction and the best-effort persistence gateway
//!
//! [`StorageArea`] is the host key/value store: fallible and asynchronous.
//! [`PersistenceGateway`] wraps an area so that the cache never sees its
//! failures. Reads fall back to defaults and writes report a warning.

use crate::error::{CacheError, Result};
use crate::types::AreaKind;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

/// An asynchronous key/value storage area with optional quotas
#[async_trait]
pub trait StorageArea: Send + Sync {
    fn kind(&self) -> AreaKind;

    /// Total quota of the area, if the host exposes one
    fn quota_bytes(&self) -> Option<u64> {
        None
    }

    /// Maximum size of a single item, if the host enforces one
    fn quota_bytes_per_item(&self) -> Option<u64> {
        None
    }

    /// Fetch the stored values for `keys`. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;

    /// Store all `items`, or none of them
    async fn set(&self, items: Map<String, Value>) -> Result<()>;

    /// Bytes currently used by the area. `None` means unknown.
    async fn bytes_in_use(&self) -> Result<Option<u64>>;
}

/// Browser-level storage estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageEstimate {
    pub quota: u64,
    pub usage: u64,
}

/// Last-resort quota source, only callable from a trusted context
#[async_trait]
pub trait StorageEstimator: Send + Sync {
    async fn estimate(&self) -> Result<StorageEstimate>;
}

/// Outcome of a gateway write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Ok,
    Warning(String),
}

impl WriteStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, WriteStatus::Ok)
    }
}

/// Best-effort reads and writes against a [`StorageArea`]
#[derive(Clone)]
pub struct PersistenceGateway {
    area: Arc<dyn StorageArea>,
}

impl PersistenceGateway {
    pub fn new(area: Arc<dyn StorageArea>) -> Self {
        Self { area }
    }

    pub fn area(&self) -> &Arc<dyn StorageArea> {
        &self.area
    }

    /// Read every key in `defaults`, keeping the default where nothing is
    /// stored or the read fails.
    pub async fn read_many(&self, defaults: Map<String, Value>) -> Map<String, Value> {
        let keys: Vec<&str> = defaults.keys().map(String::as_str).collect();
        let stored = match self.area.get(&keys).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(area = %self.area.kind(), error = %e, "Storage read failed, using defaults");
                return defaults;
            }
        };

        let mut values = defaults;
        for (key, value) in stored {
            if values.contains_key(&key) {
                values.insert(key, value);
            }
        }
        values
    }

    pub async fn read(&self, key: &str, default: Value) -> Value {
        let mut defaults = Map::new();
        defaults.insert(key.to_string(), default);
        let mut values = self.read_many(defaults).await;
        values.remove(key).unwrap_or(Value::Null)
    }

    pub async fn write(&self, items: Map<String, Value>) -> WriteStatus {
        match self.area.set(items).await {
            Ok(()) => WriteStatus::Ok,
            Err(e) => {
                warn!(area = %self.area.kind(), error = %e, "Storage write failed");
                WriteStatus::Warning(e.to_string())
            }
        }
    }
}

/// Stored size of one item: key length plus its JSON text
pub(crate) fn item_bytes(key: &str, value: &Value) -> u64 {
    let value_len = serde_json::to_string(value).map(|s| s.len()).unwrap_or(0);
    (key.len() + value_len) as u64
}

/// Check that writing `incoming` over `existing` stays within both quotas
pub(crate) fn check_quotas(
    existing: &Map<String, Value>,
    incoming: &Map<String, Value>,
    quota_bytes: Option<u64>,
    quota_bytes_per_item: Option<u64>,
) -> Result<()> {
    if let Some(limit) = quota_bytes_per_item {
        for (key, value) in incoming {
            let bytes = item_bytes(key, value);
            if bytes > limit {
                return Err(CacheError::QuotaExceeded {
                    scope: format!("item {}", key),
                    bytes,
                    limit,
                });
            }
        }
    }

    if let Some(limit) = quota_bytes {
        let unchanged: u64 = existing
            .iter()
            .filter(|(key, _)| !incoming.contains_key(*key))
            .map(|(key, value)| item_bytes(key, value))
            .sum();
        let written: u64 = incoming
            .iter()
            .map(|(key, value)| item_bytes(key, value))
            .sum();
        let bytes = unchanged + written;
        if bytes > limit {
            return Err(CacheError::QuotaExceeded {
                scope: "area".to_string(),
                bytes,
                limit,
            });
        }
    }

    Ok(())
}
