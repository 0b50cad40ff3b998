//! Budget discovery from the host's storage quotas
//!
//! Each namespace starts from its configured fallback budget. Quota sources
//! are then tried in priority order:
//!
//! 1. [`QuotaSource::AreaQuotaApi`]: the backing area's total quota minus its
//!    bytes in use, capped at the area's per-item quota.
//! 2. [`QuotaSource::StorageEstimateApi`]: the browser storage estimate, only
//!    when the area exposes no quota and the probe runs in a trusted context.
//!
//! A namespace gets `floor(available * quota_fraction)` bytes from the first
//! source that answers. Failures are logged and leave the fallback in place.
//! Entry ceilings never scale with quota.

use crate::config::CacheConfig;
use crate::gateway::{StorageArea, StorageEstimator};
use crate::types::{AreaKind, Budget, Budgets, NamespaceKind};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Where a namespace's byte budget came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaSource {
    StaticFallback,
    AreaQuotaApi,
    StorageEstimateApi,
}

impl QuotaSource {
    /// Dynamic sources, highest priority first
    pub const PRIORITY: [QuotaSource; 2] =
        [QuotaSource::AreaQuotaApi, QuotaSource::StorageEstimateApi];
}

impl fmt::Display for QuotaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaSource::StaticFallback => write!(f, "static fallback"),
            QuotaSource::AreaQuotaApi => write!(f, "area quota"),
            QuotaSource::StorageEstimateApi => write!(f, "storage estimate"),
        }
    }
}

/// Execution context the probe runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeContext {
    /// Extension pages, allowed to query the storage estimate
    Trusted,
    /// Content scripts running inside a host page
    #[default]
    Untrusted,
}

/// Answer of a single quota source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    /// Free bytes in the backing store
    Bytes(u64),
    /// The source does not exist here; try the next one
    Unsupported,
    /// The source exists but could not measure; keep the fallback
    Unknown,
}

/// Computes and caches per-namespace budgets
pub struct QuotaProbe {
    config: CacheConfig,
    sync_area: Arc<dyn StorageArea>,
    local_area: Arc<dyn StorageArea>,
    estimator: Option<Arc<dyn StorageEstimator>>,
    context: ProbeContext,
    cached: RwLock<Option<Budgets>>,
}

impl QuotaProbe {
    pub fn new(
        config: CacheConfig,
        sync_area: Arc<dyn StorageArea>,
        local_area: Arc<dyn StorageArea>,
    ) -> Self {
        Self {
            config,
            sync_area,
            local_area,
            estimator: None,
            context: ProbeContext::default(),
            cached: RwLock::new(None),
        }
    }

    /// Allow the storage estimate as a last resort from `context`
    pub fn with_estimator(
        mut self,
        estimator: Arc<dyn StorageEstimator>,
        context: ProbeContext,
    ) -> Self {
        self.estimator = Some(estimator);
        self.context = context;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Budgets for this process, probed on first use
    pub async fn budgets(&self) -> Budgets {
        if let Some(budgets) = *self.cached.read().await {
            return budgets;
        }

        let mut cached = self.cached.write().await;
        if let Some(budgets) = *cached {
            return budgets;
        }
        let budgets = self.compute_budgets().await;
        *cached = Some(budgets);
        budgets
    }

    pub async fn budget(&self, kind: NamespaceKind) -> Budget {
        self.budgets().await.get(kind)
    }

    /// Probe again and replace the cached budgets
    pub async fn refresh(&self) -> Budgets {
        let mut cached = self.cached.write().await;
        let budgets = self.compute_budgets().await;
        *cached = Some(budgets);
        budgets
    }

    /// Probe every namespace without touching the cache
    pub async fn compute_budgets(&self) -> Budgets {
        let mut budgets = Budgets {
            saved_points: self.config.saved_points.fallback,
            student_names: self.config.student_names.fallback,
        };
        for kind in NamespaceKind::ALL {
            let (budget, source) = self.probe_namespace(kind).await;
            info!(
                namespace = %kind,
                source = %source,
                max_entries = ?budget.max_entries,
                max_bytes = ?budget.max_bytes,
                "Computed namespace budget"
            );
            budgets.set(kind, budget);
        }
        budgets
    }

    async fn probe_namespace(&self, kind: NamespaceKind) -> (Budget, QuotaSource) {
        let ns = self.config.namespace(kind);
        let area = self.area(kind.area());
        let mut budget = ns.fallback;

        for source in QuotaSource::PRIORITY {
            match self.available_bytes(source, kind, area.as_ref()).await {
                Availability::Bytes(available) => {
                    let mut max_bytes = (available as f64 * ns.quota_fraction).floor() as u64;
                    if let Some(per_item) = area.quota_bytes_per_item() {
                        max_bytes = max_bytes.min(per_item);
                    }
                    budget.max_bytes = Some(max_bytes);
                    return (budget, source);
                }
                Availability::Unsupported => continue,
                Availability::Unknown => break,
            }
        }

        (budget, QuotaSource::StaticFallback)
    }

    async fn available_bytes(
        &self,
        source: QuotaSource,
        kind: NamespaceKind,
        area: &dyn StorageArea,
    ) -> Availability {
        match source {
            QuotaSource::StaticFallback => Availability::Unsupported,
            QuotaSource::AreaQuotaApi => {
                let Some(quota) = area.quota_bytes() else {
                    return Availability::Unsupported;
                };
                match area.bytes_in_use().await {
                    Ok(Some(used)) => Availability::Bytes(quota.saturating_sub(used)),
                    Ok(None) => {
                        debug!(namespace = %kind, area = %area.kind(), "Bytes in use unknown");
                        Availability::Unknown
                    }
                    Err(e) => {
                        warn!(namespace = %kind, area = %area.kind(), error = %e, "Failed to read storage usage");
                        Availability::Unknown
                    }
                }
            }
            QuotaSource::StorageEstimateApi => {
                let Some(estimator) = &self.estimator else {
                    return Availability::Unsupported;
                };
                if self.context != ProbeContext::Trusted {
                    debug!(namespace = %kind, "Skipping storage estimate outside a trusted context");
                    return Availability::Unsupported;
                }
                match estimator.estimate().await {
                    Ok(estimate) => Availability::Bytes(estimate.quota.saturating_sub(estimate.usage)),
                    Err(e) => {
                        warn!(namespace = %kind, error = %e, "Failed to get storage estimate");
                        Availability::Unknown
                    }
                }
            }
        }
    }

    fn area(&self, kind: AreaKind) -> &Arc<dyn StorageArea> {
        match kind {
            AreaKind::Sync => &self.sync_area,
            AreaKind::Local => &self.local_area,
        }
    }
}
