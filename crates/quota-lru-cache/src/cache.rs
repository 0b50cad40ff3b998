//! Process-wide cache handle
//!
//! A [`Cache`] is built once with its collaborators and owns one
//! [`NamespaceQueue`] per namespace kind plus the shared [`QuotaProbe`].

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::gateway::{StorageArea, StorageEstimator};
use crate::namespace::CacheNamespace;
use crate::queue::NamespaceQueue;
use crate::quota::{ProbeContext, QuotaProbe};
use crate::types::{AreaKind, Budgets, NamespaceKind};
use std::sync::Arc;
use tracing::info;

pub struct CacheBuilder {
    sync_area: Arc<dyn StorageArea>,
    local_area: Arc<dyn StorageArea>,
    config: CacheConfig,
    estimator: Option<(Arc<dyn StorageEstimator>, ProbeContext)>,
    clock: Arc<dyn Clock>,
}

impl CacheBuilder {
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn estimator(mut self, estimator: Arc<dyn StorageEstimator>, context: ProbeContext) -> Self {
        self.estimator = Some((estimator, context));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and start the namespace workers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Cache> {
        self.config.validate()?;

        let mut probe = QuotaProbe::new(
            self.config,
            self.sync_area.clone(),
            self.local_area.clone(),
        );
        if let Some((estimator, context)) = self.estimator {
            probe = probe.with_estimator(estimator, context);
        }
        let probe = Arc::new(probe);

        let queue_for = |kind: NamespaceKind| {
            let area = match kind.area() {
                AreaKind::Sync => self.sync_area.clone(),
                AreaKind::Local => self.local_area.clone(),
            };
            NamespaceQueue::spawn(CacheNamespace::new(
                kind,
                area,
                probe.clone(),
                self.clock.clone(),
            ))
        };

        Ok(Cache {
            saved_points: queue_for(NamespaceKind::SavedPoints),
            student_names: queue_for(NamespaceKind::StudentNames),
            probe: probe.clone(),
        })
    }
}

/// Entry point for callers: both namespaces behind their queues
#[derive(Clone)]
pub struct Cache {
    saved_points: NamespaceQueue,
    student_names: NamespaceQueue,
    probe: Arc<QuotaProbe>,
}

impl Cache {
    pub fn builder(sync_area: Arc<dyn StorageArea>, local_area: Arc<dyn StorageArea>) -> CacheBuilder {
        CacheBuilder {
            sync_area,
            local_area,
            config: CacheConfig::default(),
            estimator: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Probe budgets eagerly instead of on first use
    pub async fn initialize(&self) -> Budgets {
        let budgets = self.probe.budgets().await;
        info!(
            saved_points_max_entries = ?budgets.saved_points.max_entries,
            saved_points_max_bytes = ?budgets.saved_points.max_bytes,
            student_names_max_entries = ?budgets.student_names.max_entries,
            student_names_max_bytes = ?budgets.student_names.max_bytes,
            "Cache budgets ready"
        );
        budgets
    }

    pub async fn budgets(&self) -> Budgets {
        self.probe.budgets().await
    }

    /// Re-probe host quotas, replacing the cached budgets
    pub async fn refresh_budgets(&self) -> Budgets {
        self.probe.refresh().await
    }

    pub fn namespace(&self, kind: NamespaceKind) -> &NamespaceQueue {
        match kind {
            NamespaceKind::SavedPoints => &self.saved_points,
            NamespaceKind::StudentNames => &self.student_names,
        }
    }

    pub fn saved_points(&self) -> &NamespaceQueue {
        &self.saved_points
    }

    pub fn student_names(&self) -> &NamespaceQueue {
        &self.student_names
    }
}
