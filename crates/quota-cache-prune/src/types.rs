//! Configuration for the cache prune tool

use quota_lru_cache::{LOCAL_QUOTA_BYTES, SYNC_QUOTA_BYTES, SYNC_QUOTA_BYTES_PER_ITEM};
use std::path::PathBuf;

pub const SYNC_STORE_FILE: &str = "sync.json";
pub const LOCAL_STORE_FILE: &str = "local.json";

#[derive(Debug, Clone, PartialEq)]
pub struct PruneToolConfig {
    pub store_dir: PathBuf,
    pub sync_quota_bytes: u64,
    pub sync_quota_bytes_per_item: u64,
    pub local_quota_bytes: u64,
}

impl PruneToolConfig {
    pub fn sync_path(&self) -> PathBuf {
        self.store_dir.join(SYNC_STORE_FILE)
    }

    pub fn local_path(&self) -> PathBuf {
        self.store_dir.join(LOCAL_STORE_FILE)
    }
}

impl Default for PruneToolConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("./data/store"),
            sync_quota_bytes: SYNC_QUOTA_BYTES,
            sync_quota_bytes_per_item: SYNC_QUOTA_BYTES_PER_ITEM,
            local_quota_bytes: LOCAL_QUOTA_BYTES,
        }
    }
}
