//! Per-namespace command queue
//!
//! One worker task owns a [`CacheNamespace`] and applies commands in arrival
//! order, so concurrent callers never interleave their read-modify-write
//! cycles.

use crate::error::{CacheError, Result};
use crate::namespace::CacheNamespace;
use crate::types::{Budget, Entries, Meta, NamespaceKind, NamespaceSnapshot, PruneOutcome};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

const QUEUE_CAPACITY: usize = 64;

enum Command {
    MergeAndPrune {
        entries: Entries,
        reply: oneshot::Sender<PruneOutcome>,
    },
    ReplaceAndPrune {
        entries: Entries,
        reply: oneshot::Sender<PruneOutcome>,
    },
    TouchOnly {
        keys: Vec<String>,
        reply: oneshot::Sender<Meta>,
    },
    PruneNow {
        reply: oneshot::Sender<PruneOutcome>,
    },
    Load {
        reply: oneshot::Sender<NamespaceSnapshot>,
    },
}

/// Handle to a namespace worker. Cheap to clone.
#[derive(Clone)]
pub struct NamespaceQueue {
    kind: NamespaceKind,
    namespace: Arc<CacheNamespace>,
    tx: mpsc::Sender<Command>,
}

impl NamespaceQueue {
    /// Spawn the worker for `namespace`. Must be called inside a tokio runtime.
    pub fn spawn(namespace: CacheNamespace) -> Self {
        let kind = namespace.kind();
        let namespace = Arc::new(namespace);
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

        tokio::spawn(run_worker(namespace.clone(), rx));

        Self {
            kind,
            namespace,
            tx,
        }
    }

    pub fn kind(&self) -> NamespaceKind {
        self.kind
    }

    /// Current budget. Does not wait behind queued writes.
    pub async fn budget(&self) -> Budget {
        self.namespace.budget().await
    }

    pub async fn load(&self) -> Result<NamespaceSnapshot> {
        self.request(|reply| Command::Load { reply }).await
    }

    pub async fn merge_and_prune(&self, entries: Entries) -> Result<PruneOutcome> {
        self.request(|reply| Command::MergeAndPrune { entries, reply })
            .await
    }

    pub async fn replace_and_prune(&self, entries: Entries) -> Result<PruneOutcome> {
        self.request(|reply| Command::ReplaceAndPrune { entries, reply })
            .await
    }

    pub async fn touch_only<I, K>(&self, keys: I) -> Result<Meta>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        self.request(|reply| Command::TouchOnly { keys, reply }).await
    }

    pub async fn prune_now(&self) -> Result<PruneOutcome> {
        self.request(|reply| Command::PruneNow { reply }).await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| CacheError::QueueClosed(self.kind.to_string()))?;
        response
            .await
            .map_err(|_| CacheError::QueueClosed(self.kind.to_string()))
    }
}

async fn run_worker(namespace: Arc<CacheNamespace>, mut rx: mpsc::Receiver<Command>) {
    let kind = namespace.kind();
    debug!(namespace = %kind, "Namespace worker started");

    while let Some(command) = rx.recv().await {
        // A dropped reply only means the caller stopped waiting.
        match command {
            Command::MergeAndPrune { entries, reply } => {
                let _ = reply.send(namespace.merge_and_prune(entries).await);
            }
            Command::ReplaceAndPrune { entries, reply } => {
                let _ = reply.send(namespace.replace_and_prune(entries).await);
            }
            Command::TouchOnly { keys, reply } => {
                let _ = reply.send(namespace.touch_only(keys).await);
            }
            Command::PruneNow { reply } => {
                let _ = reply.send(namespace.prune_now().await);
            }
            Command::Load { reply } => {
                let _ = reply.send(namespace.load().await);
            }
        }
    }

    info!(namespace = %kind, "Namespace worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use crate::memory::MemoryArea;
    use crate::quota::QuotaProbe;
    use crate::types::AreaKind;
    use serde_json::json;

    fn queue(max_entries: usize) -> NamespaceQueue {
        let mut config = CacheConfig::default();
        config.saved_points.fallback = Budget::new(max_entries, 8 * 1024);

        let sync_area = Arc::new(MemoryArea::new(AreaKind::Sync));
        let probe = Arc::new(QuotaProbe::new(
            config,
            sync_area.clone(),
            Arc::new(MemoryArea::new(AreaKind::Local)),
        ));
        let namespace = CacheNamespace::new(
            NamespaceKind::SavedPoints,
            sync_area,
            probe,
            Arc::new(ManualClock::new(1_000)),
        );
        NamespaceQueue::spawn(namespace)
    }

    fn single(key: &str, value: i64) -> Entries {
        let mut entries = Entries::new();
        entries.insert(key.to_string(), json!(value));
        entries
    }

    #[tokio::test]
    async fn test_concurrent_merges_lose_no_updates() {
        let queue = queue(1_000);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.merge_and_prune(single(&format!("q{}", i), i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = queue.load().await.unwrap();
        assert_eq!(snapshot.entries.len(), 20);
        assert_eq!(snapshot.meta.last_used.len(), 20);
        assert_eq!(snapshot.entries["q7"], json!(7));
    }

    #[tokio::test]
    async fn test_touch_and_prune_through_queue() {
        let queue = queue(2);

        queue.merge_and_prune(single("a", 1)).await.unwrap();
        queue.merge_and_prune(single("b", 2)).await.unwrap();
        let meta = queue.touch_only(["a", "missing"]).await.unwrap();
        assert_eq!(meta.last_used.len(), 2);

        let outcome = queue.prune_now().await.unwrap();
        assert!(outcome.evicted.is_empty());

        let outcome = queue.replace_and_prune(single("c", 3)).await.unwrap();
        assert_eq!(outcome.entries.keys().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(queue.budget().await, Budget::new(2, 8 * 1024));
    }
}
