//! In-memory storage area with host-like quota enforcement

use crate::config::{LOCAL_QUOTA_BYTES, SYNC_QUOTA_BYTES, SYNC_QUOTA_BYTES_PER_ITEM};
use crate::error::{CacheError, Result};
use crate::gateway::{check_quotas, item_bytes, StorageArea};
use crate::types::AreaKind;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// A [`StorageArea`] held in process memory
pub struct MemoryArea {
    kind: AreaKind,
    items: RwLock<Map<String, Value>>,
    quota_bytes: Option<u64>,
    quota_bytes_per_item: Option<u64>,
    /// When set, every request fails as if the host reported an error
    failing: AtomicBool,
}

impl MemoryArea {
    /// Create an area without quotas
    pub fn new(kind: AreaKind) -> Self {
        Self {
            kind,
            items: RwLock::new(Map::new()),
            quota_bytes: None,
            quota_bytes_per_item: None,
            failing: AtomicBool::new(false),
        }
    }

    /// Sync area with the usual 100 KiB total and 8 KiB per-item quotas
    pub fn sync_area() -> Self {
        Self::new(AreaKind::Sync).with_quota(Some(SYNC_QUOTA_BYTES), Some(SYNC_QUOTA_BYTES_PER_ITEM))
    }

    /// Local area with the usual 10 MiB quota
    pub fn local_area() -> Self {
        Self::new(AreaKind::Local).with_quota(Some(LOCAL_QUOTA_BYTES), None)
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>, quota_bytes_per_item: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self.quota_bytes_per_item = quota_bytes_per_item;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Stored value for `key`, bypassing failure simulation
    pub async fn item(&self, key: &str) -> Option<Value> {
        self.items.read().await.get(key).cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Storage(format!("{} area unavailable", self.kind)));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageArea for MemoryArea {
    fn kind(&self) -> AreaKind {
        self.kind
    }

    fn quota_bytes(&self) -> Option<u64> {
        self.quota_bytes
    }

    fn quota_bytes_per_item(&self) -> Option<u64> {
        self.quota_bytes_per_item
    }

    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        self.check_available()?;
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| items.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, incoming: Map<String, Value>) -> Result<()> {
        self.check_available()?;
        let mut items = self.items.write().await;
        check_quotas(&items, &incoming, self.quota_bytes, self.quota_bytes_per_item)?;
        items.extend(incoming);
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<Option<u64>> {
        self.check_available()?;
        let items = self.items.read().await;
        Ok(Some(items.iter().map(|(k, v)| item_bytes(k, v)).sum()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let area = MemoryArea::new(AreaKind::Local);
        area.set(map(&[("a", json!(1)), ("b", json!({ "x": true }))]))
            .await
            .unwrap();

        let got = area.get(&["a", "missing"]).await.unwrap();
        assert_eq!(got, map(&[("a", json!(1))]));
        assert_eq!(area.item("b").await, Some(json!({ "x": true })));
    }

    #[tokio::test]
    async fn test_bytes_in_use() {
        let area = MemoryArea::new(AreaKind::Local);
        assert_eq!(area.bytes_in_use().await.unwrap(), Some(0));

        area.set(map(&[("ab", json!("cd"))])).await.unwrap();
        // "ab" + "\"cd\""
        assert_eq!(area.bytes_in_use().await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_per_item_quota_rejects_whole_write() {
        let area = MemoryArea::new(AreaKind::Sync).with_quota(None, Some(16));
        let result = area
            .set(map(&[("ok", json!(1)), ("big", json!("x".repeat(32)))]))
            .await;

        assert!(matches!(result, Err(CacheError::QuotaExceeded { .. })));
        assert_eq!(area.item("ok").await, None);
    }

    #[tokio::test]
    async fn test_total_quota() {
        let area = MemoryArea::new(AreaKind::Local).with_quota(Some(10), None);
        area.set(map(&[("a", json!("1234"))])).await.unwrap();
        assert!(area.set(map(&[("b", json!("123456"))])).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_area() {
        let area = MemoryArea::local_area();
        area.set_failing(true);
        assert!(area.get(&["a"]).await.is_err());
        assert!(area.set(Map::new()).await.is_err());
        assert!(area.bytes_in_use().await.is_err());

        area.set_failing(false);
        assert!(area.get(&["a"]).await.is_ok());
    }

    #[test]
    fn test_presets() {
        let sync = MemoryArea::sync_area();
        assert_eq!(sync.kind(), AreaKind::Sync);
        assert_eq!(sync.quota_bytes(), Some(SYNC_QUOTA_BYTES));
        assert_eq!(sync.quota_bytes_per_item(), Some(SYNC_QUOTA_BYTES_PER_ITEM));

        let local = MemoryArea::local_area();
        assert_eq!(local.quota_bytes(), Some(LOCAL_QUOTA_BYTES));
        assert_eq!(local.quota_bytes_per_item(), None);
    }
}
