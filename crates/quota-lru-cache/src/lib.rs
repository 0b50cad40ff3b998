//! Quota-aware bounded key/value cache with LRU eviction
//!
//! Two independently budgeted namespaces (`savedPoints` in the sync area,
//! `studentNames` in the local area) live in an asynchronous key/value store
//! whose capacity is discovered at runtime. Every mutation records last-used
//! timestamps and prunes the least recently used entries until both the
//! entry-count and byte budgets hold.

mod cache;
mod changes;
mod clock;
mod config;
mod error;
mod eviction;
mod file_area;
mod gateway;
mod memory;
mod namespace;
mod queue;
mod quota;
mod recency;
mod size;
mod types;

pub use cache::{Cache, CacheBuilder};
pub use changes::{diff_entries, is_meta_key, is_meta_only, EntryChange};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CacheConfig, NamespaceConfig, LOCAL_QUOTA_BYTES, SYNC_QUOTA_BYTES, SYNC_QUOTA_BYTES_PER_ITEM,
};
pub use error::{CacheError, Result};
pub use eviction::prune;
pub use file_area::JsonFileArea;
pub use gateway::{PersistenceGateway, StorageArea, StorageEstimate, StorageEstimator, WriteStatus};
pub use memory::MemoryArea;
pub use namespace::CacheNamespace;
pub use queue::NamespaceQueue;
pub use quota::{ProbeContext, QuotaProbe, QuotaSource};
pub use recency::{ensure_meta, normalize, touch};
pub use size::estimate_bytes;
pub use types::{
    AreaKind, Budget, Budgets, Entries, Meta, NamespaceKind, NamespaceSnapshot, PruneOutcome,
    Timestamp, NEVER_USED,
};
