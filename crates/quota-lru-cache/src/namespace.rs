//! A budgeted namespace: load, touch, merge, prune, write back
//!
//! Every operation is a read-modify-write against the backing area and is not
//! atomic. Concurrent callers in one process should go through
//! [`NamespaceQueue`](crate::queue::NamespaceQueue).

use crate::clock::Clock;
use crate::eviction::{evict_oldest_until, prune};
use crate::gateway::{item_bytes, PersistenceGateway, StorageArea};
use crate::quota::QuotaProbe;
use crate::recency::{ensure_meta, normalize, touch};
use crate::types::{Budget, Entries, Meta, NamespaceKind, NamespaceSnapshot, PruneOutcome};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct CacheNamespace {
    kind: NamespaceKind,
    gateway: PersistenceGateway,
    probe: Arc<QuotaProbe>,
    clock: Arc<dyn Clock>,
}

impl CacheNamespace {
    pub fn new(
        kind: NamespaceKind,
        area: Arc<dyn StorageArea>,
        probe: Arc<QuotaProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            kind,
            gateway: PersistenceGateway::new(area),
            probe,
            clock,
        }
    }

    pub fn kind(&self) -> NamespaceKind {
        self.kind
    }

    /// Current budget for this namespace
    pub async fn budget(&self) -> Budget {
        self.probe.budget(self.kind).await
    }

    /// Persisted entries and normalized meta
    pub async fn load(&self) -> NamespaceSnapshot {
        let (entries, meta) = self.read_state().await;
        let meta = normalize(&entries, meta);
        NamespaceSnapshot { entries, meta }
    }

    /// Merge `new_entries` over the stored map, mark them used and prune.
    ///
    /// New values win on key collisions. Only the merged keys are touched.
    pub async fn merge_and_prune(&self, new_entries: Entries) -> PruneOutcome {
        if new_entries.is_empty() {
            let snapshot = self.load().await;
            return PruneOutcome {
                entries: snapshot.entries,
                meta: snapshot.meta,
                evicted: Vec::new(),
            };
        }

        let (mut entries, meta) = self.read_state().await;
        let touched: Vec<String> = new_entries.keys().cloned().collect();
        entries.extend(new_entries);
        let meta = touch(meta, &touched, self.clock.now_millis());

        self.prune_and_persist(entries, meta).await
    }

    /// Replace the stored map with `entries`, mark all of them used and prune
    pub async fn replace_and_prune(&self, entries: Entries) -> PruneOutcome {
        let (_, meta) = self.read_state().await;
        let meta = touch(meta, entries.keys(), self.clock.now_millis());

        self.prune_and_persist(entries, meta).await
    }

    /// Mark existing keys as used without adding entries.
    ///
    /// Keys that are not stored are ignored. Only the meta is written.
    pub async fn touch_only<I, K>(&self, keys: I) -> Meta
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<K> = keys
            .into_iter()
            .filter(|key| {
                let key: &str = key.as_ref();
                !key.is_empty()
            })
            .collect();
        if keys.is_empty() {
            return self.load().await.meta;
        }

        let (entries, meta) = self.read_state().await;
        let meta = normalize(&entries, touch(meta, &keys, self.clock.now_millis()));

        let mut items = Map::new();
        items.insert(self.kind.meta_key().to_string(), meta.to_value());
        self.gateway.write(items).await;
        meta
    }

    /// Prune the stored state against the current budget.
    ///
    /// Writes back only when pruning or normalization changed something.
    pub async fn prune_now(&self) -> PruneOutcome {
        let (entries, meta) = self.read_state().await;
        let outcome = self.prune_to_fit(entries, meta.clone()).await;

        if outcome.evicted.is_empty() && outcome.meta == meta {
            debug!(namespace = %self.kind, "Namespace within budget");
            return outcome;
        }

        self.persist(&outcome).await;
        self.report_evictions(&outcome.evicted);
        outcome
    }

    async fn prune_and_persist(&self, entries: Entries, meta: Meta) -> PruneOutcome {
        let outcome = self.prune_to_fit(entries, meta).await;
        self.persist(&outcome).await;
        self.report_evictions(&outcome.evicted);
        outcome
    }

    /// Prune against the budget, then keep evicting while the meta record
    /// would exceed the area's per-item quota. The entries item is already
    /// bounded by the byte budget.
    async fn prune_to_fit(&self, entries: Entries, meta: Meta) -> PruneOutcome {
        let budget = self.budget().await;
        let mut outcome = prune(entries, meta, &budget);

        if let Some(limit) = self.gateway.area().quota_bytes_per_item() {
            let meta_key = self.kind.meta_key();
            let pruned = outcome.evicted.len();
            evict_oldest_until(&mut outcome, |_, meta| {
                item_bytes(meta_key, &meta.to_value()) <= limit
            });
            if outcome.evicted.len() > pruned {
                debug!(
                    namespace = %self.kind,
                    limit,
                    extra = outcome.evicted.len() - pruned,
                    "Evicted entries to fit meta within the item quota"
                );
            }
        }

        outcome
    }

    /// Stored entries and ensured, not yet normalized, meta
    async fn read_state(&self) -> (Entries, Meta) {
        let mut defaults = Map::new();
        defaults.insert(self.kind.storage_key().to_string(), Value::Object(Map::new()));
        defaults.insert(self.kind.meta_key().to_string(), Meta::default().to_value());

        let mut values = self.gateway.read_many(defaults).await;
        let entries = match values.remove(self.kind.storage_key()) {
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(other) => {
                warn!(namespace = %self.kind, found = %other, "Stored entries are not an object, resetting");
                Entries::new()
            }
            None => Entries::new(),
        };
        let meta = ensure_meta(values.get(self.kind.meta_key()));

        (entries, meta)
    }

    async fn persist(&self, outcome: &PruneOutcome) {
        let entries: Map<String, Value> = outcome
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut items = Map::new();
        items.insert(self.kind.storage_key().to_string(), Value::Object(entries));
        items.insert(self.kind.meta_key().to_string(), outcome.meta.to_value());
        self.gateway.write(items).await;
    }

    fn report_evictions(&self, evicted: &[String]) {
        if !evicted.is_empty() {
            warn!(
                namespace = %self.kind,
                evicted = evicted.len(),
                "Pruned namespace entries to fit budget"
            );
            debug!(namespace = %self.kind, keys = ?evicted, "Evicted keys");
        }
    }
}
