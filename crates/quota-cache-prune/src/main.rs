//! Quota cache prune tool
//!
//! Opens the on-disk sync and local stores, discovers each namespace's
//! budget and prunes both namespaces down to it.

mod error;
mod types;

use crate::error::Result;
use crate::types::PruneToolConfig;
use quota_lru_cache::{
    AreaKind, Cache, CacheConfig, JsonFileArea, NamespaceKind, PruneOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter =
        EnvFilter::from_default_env().add_directive("quota_cache_prune=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting quota cache prune...");

    let config = load_config();
    info!("Store dir: {:?}", config.store_dir);
    info!(
        "Sync quota: {} bytes ({} per item)",
        config.sync_quota_bytes, config.sync_quota_bytes_per_item
    );
    info!("Local quota: {} bytes", config.local_quota_bytes);

    let outcomes = prune_stores(&config, CacheConfig::from_env()?).await?;
    for (kind, outcome) in &outcomes {
        info!(
            namespace = %kind,
            remaining = outcome.entries.len(),
            evicted = outcome.evicted.len(),
            "Namespace pruned"
        );
    }

    Ok(())
}

fn load_config() -> PruneToolConfig {
    let defaults = PruneToolConfig::default();

    let store_dir = std::env::var("STORE_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.store_dir);

    let sync_quota_bytes = std::env::var("SYNC_QUOTA_BYTES")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.sync_quota_bytes);

    let sync_quota_bytes_per_item = std::env::var("SYNC_QUOTA_BYTES_PER_ITEM")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.sync_quota_bytes_per_item);

    let local_quota_bytes = std::env::var("LOCAL_QUOTA_BYTES")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(defaults.local_quota_bytes);

    PruneToolConfig {
        store_dir,
        sync_quota_bytes,
        sync_quota_bytes_per_item,
        local_quota_bytes,
    }
}

async fn prune_stores(
    config: &PruneToolConfig,
    cache_config: CacheConfig,
) -> Result<Vec<(NamespaceKind, PruneOutcome)>> {
    let sync_area = JsonFileArea::new(AreaKind::Sync, config.sync_path()).with_quota(
        Some(config.sync_quota_bytes),
        Some(config.sync_quota_bytes_per_item),
    );
    sync_area.init().await?;

    let local_area = JsonFileArea::new(AreaKind::Local, config.local_path())
        .with_quota(Some(config.local_quota_bytes), None);
    local_area.init().await?;

    let cache = Cache::builder(Arc::new(sync_area), Arc::new(local_area))
        .config(cache_config)
        .build()?;
    cache.initialize().await;

    let mut outcomes = Vec::new();
    for kind in NamespaceKind::ALL {
        let outcome = cache.namespace(kind).prune_now().await?;
        if !outcome.evicted.is_empty() {
            warn!(namespace = %kind, keys = ?outcome.evicted, "Evicted entries");
        }
        outcomes.push((kind, outcome));
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quota_lru_cache::{Budget, StorageArea};
    use serde_json::{json, Map, Value};

    fn store_config(dir: &std::path::Path) -> PruneToolConfig {
        PruneToolConfig {
            store_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_prunes_oversized_namespace_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = store_config(dir.path());

        let names: Map<String, Value> = (0..5).map(|i| (format!("s{}", i), json!(i))).collect();
        let last_used: Map<String, Value> =
            (0..5).map(|i| (format!("s{}", i), json!(100 + i))).collect();
        let mut items = Map::new();
        items.insert("studentNames".to_string(), Value::Object(names));
        items.insert(
            "studentNamesMeta".to_string(),
            json!({ "lastUsed": last_used }),
        );
        let local = JsonFileArea::new(AreaKind::Local, config.local_path());
        local.set(items).await.unwrap();

        let mut cache_config = CacheConfig::default();
        cache_config.student_names.fallback = Budget::new(3, 128 * 1024);

        let outcomes = prune_stores(&config, cache_config).await.unwrap();
        let (_, student_names) = outcomes
            .iter()
            .find(|(kind, _)| *kind == NamespaceKind::StudentNames)
            .unwrap();
        assert_eq!(student_names.evicted, vec!["s0".to_string(), "s1".to_string()]);

        let stored = local.get(&["studentNames"]).await.unwrap();
        assert_eq!(stored["studentNames"], json!({ "s2": 2, "s3": 3, "s4": 4 }));
    }

    #[tokio::test]
    async fn test_empty_store_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = store_config(&dir.path().join("fresh"));

        let outcomes = prune_stores(&config, CacheConfig::default()).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, o)| o.entries.is_empty()));
        assert!(config.store_dir.is_dir());
    }
}
