//! Storage area persisted as a single JSON document on disk

use crate::error::{CacheError, Result};
use crate::gateway::{check_quotas, item_bytes, StorageArea};
use crate::types::AreaKind;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A [`StorageArea`] backed by one JSON file.
///
/// Every write rewrites the whole document through a temporary file and a
/// rename, so readers never observe a half-written store.
pub struct JsonFileArea {
    kind: AreaKind,
    path: PathBuf,
    quota_bytes: Option<u64>,
    quota_bytes_per_item: Option<u64>,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileArea {
    pub fn new(kind: AreaKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            quota_bytes: None,
            quota_bytes_per_item: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_quota(mut self, quota_bytes: Option<u64>, quota_bytes_per_item: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self.quota_bytes_per_item = quota_bytes_per_item;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    pub async fn init(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        info!(area = %self.kind, path = ?self.path, "Storage area initialized");
        Ok(())
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "Store file missing, treating as empty");
                return Ok(Map::new());
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(items) => Ok(items),
            other => Err(CacheError::Serialization(format!(
                "store root must be an object, found {}",
                json_type(&other)
            ))),
        }
    }

    async fn persist(&self, items: &Map<String, Value>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(items)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl StorageArea for JsonFileArea {
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
        let mut items = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|key| items.remove(*key).map(|v| (key.to_string(), v)))
            .collect())
    }

    async fn set(&self, incoming: Map<String, Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;
        check_quotas(&items, &incoming, self.quota_bytes, self.quota_bytes_per_item)?;
        items.extend(incoming);
        self.persist(&items).await?;
        debug!(area = %self.kind, path = ?self.path, "Store written");
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<Option<u64>> {
        let items = self.load().await?;
        Ok(Some(items.iter().map(|(k, v)| item_bytes(k, v)).sum()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let area = JsonFileArea::new(AreaKind::Local, dir.path().join("local.json"));

        assert!(area.get(&["a"]).await.unwrap().is_empty());
        assert_eq!(area.bytes_in_use().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_round_trip_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("sync.json");

        let area = JsonFileArea::new(AreaKind::Sync, path.clone());
        area.init().await.unwrap();
        area.set(map(&[("savedPoints", json!({ "q1": 3 }))]))
            .await
            .unwrap();
        area.set(map(&[("savedPointsMeta", json!({ "lastUsed": { "q1": 5 } }))]))
            .await
            .unwrap();

        let reopened = JsonFileArea::new(AreaKind::Sync, path);
        let got = reopened
            .get(&["savedPoints", "savedPointsMeta"])
            .await
            .unwrap();
        assert_eq!(got["savedPoints"], json!({ "q1": 3 }));
        assert_eq!(got["savedPointsMeta"], json!({ "lastUsed": { "q1": 5 } }));
    }

    #[tokio::test]
    async fn test_quota_rejection_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let area = JsonFileArea::new(AreaKind::Sync, dir.path().join("sync.json"))
            .with_quota(None, Some(10));

        area.set(map(&[("a", json!(1))])).await.unwrap();
        let result = area.set(map(&[("a", json!("x".repeat(20)))])).await;

        assert!(matches!(result, Err(CacheError::QuotaExceeded { .. })));
        assert_eq!(area.get(&["a"]).await.unwrap()["a"], json!(1));
    }

    #[tokio::test]
    async fn test_non_object_root_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.json");
        tokio::fs::write(&path, b"[1, 2]").await.unwrap();

        let area = JsonFileArea::new(AreaKind::Local, path);
        let err = area.get(&["a"]).await.unwrap_err();
        assert!(format!("{}", err).contains("array"));
    }
}
