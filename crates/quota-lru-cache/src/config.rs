//! Budget configuration for the cache namespaces
//!
//! Fallback budgets apply whenever quota discovery yields nothing. The quota
//! fraction is the share of the backing area's free space a namespace may use.

use crate::error::{CacheError, Result};
use crate::types::{Budget, NamespaceKind};

/// Total quota of the sync area
pub const SYNC_QUOTA_BYTES: u64 = 102_400;
/// Per-item ceiling of the sync area
pub const SYNC_QUOTA_BYTES_PER_ITEM: u64 = 8_192;
/// Total quota of the local area
pub const LOCAL_QUOTA_BYTES: u64 = 10_485_760;

const SAVED_POINTS_MAX_ENTRIES: usize = 5_000;
const SAVED_POINTS_FALLBACK_BYTES: u64 = 8 * 1024;
const SAVED_POINTS_QUOTA_FRACTION: f64 = 0.8;

const STUDENT_NAMES_MAX_ENTRIES: usize = 10_000;
const STUDENT_NAMES_FALLBACK_BYTES: u64 = 128 * 1024;
const STUDENT_NAMES_QUOTA_FRACTION: f64 = 0.6;

/// Budget settings for one namespace kind
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceConfig {
    /// Used when no quota source is available. `max_entries` is always taken from here.
    pub fallback: Budget,
    /// Share of the area's available bytes given to this namespace
    pub quota_fraction: f64,
}

/// Configuration for the whole cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub saved_points: NamespaceConfig,
    pub student_names: NamespaceConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            saved_points: NamespaceConfig {
                fallback: Budget::new(SAVED_POINTS_MAX_ENTRIES, SAVED_POINTS_FALLBACK_BYTES),
                quota_fraction: SAVED_POINTS_QUOTA_FRACTION,
            },
            student_names: NamespaceConfig {
                fallback: Budget::new(STUDENT_NAMES_MAX_ENTRIES, STUDENT_NAMES_FALLBACK_BYTES),
                quota_fraction: STUDENT_NAMES_QUOTA_FRACTION,
            },
        }
    }
}

impl CacheConfig {
    pub fn namespace(&self, kind: NamespaceKind) -> &NamespaceConfig {
        match kind {
            NamespaceKind::SavedPoints => &self.saved_points,
            NamespaceKind::StudentNames => &self.student_names,
        }
    }

    /// Load overrides from the environment.
    ///
    /// Reads `SAVED_POINTS_MAX_ENTRIES`, `SAVED_POINTS_FALLBACK_BYTES`,
    /// `SAVED_POINTS_QUOTA_FRACTION` and the matching `STUDENT_NAMES_*`
    /// variables. Missing or unparsable values keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            saved_points: namespace_from_lookup(&lookup, "SAVED_POINTS", &defaults.saved_points),
            student_names: namespace_from_lookup(
                &lookup,
                "STUDENT_NAMES",
                &defaults.student_names,
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for kind in NamespaceKind::ALL {
            let fraction = self.namespace(kind).quota_fraction;
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(CacheError::Config(format!(
                    "{} quota fraction must be in (0, 1], got {}",
                    kind, fraction
                )));
            }
        }
        Ok(())
    }
}

fn namespace_from_lookup(
    lookup: &impl Fn(&str) -> Option<String>,
    prefix: &str,
    defaults: &NamespaceConfig,
) -> NamespaceConfig {
    let max_entries = lookup(&format!("{}_MAX_ENTRIES", prefix))
        .and_then(|s| s.parse::<usize>().ok())
        .or(defaults.fallback.max_entries);

    let max_bytes = lookup(&format!("{}_FALLBACK_BYTES", prefix))
        .and_then(|s| s.parse::<u64>().ok())
        .or(defaults.fallback.max_bytes);

    let quota_fraction = lookup(&format!("{}_QUOTA_FRACTION", prefix))
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(defaults.quota_fraction);

    NamespaceConfig {
        fallback: Budget {
            max_entries,
            max_bytes,
        },
        quota_fraction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.saved_points.fallback, Budget::new(5_000, 8 * 1024));
        assert_eq!(config.saved_points.quota_fraction, 0.8);
        assert_eq!(config.student_names.fallback, Budget::new(10_000, 128 * 1024));
        assert_eq!(config.student_names.quota_fraction, 0.6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = CacheConfig::from_lookup(lookup_from(&[
            ("SAVED_POINTS_MAX_ENTRIES", "50"),
            ("STUDENT_NAMES_FALLBACK_BYTES", "2048"),
            ("STUDENT_NAMES_QUOTA_FRACTION", "0.25"),
        ]))
        .unwrap();

        assert_eq!(config.saved_points.fallback, Budget::new(50, 8 * 1024));
        assert_eq!(config.student_names.fallback, Budget::new(10_000, 2048));
        assert_eq!(config.student_names.quota_fraction, 0.25);
    }

    #[test]
    fn test_unparsable_values_keep_defaults() {
        let config = CacheConfig::from_lookup(lookup_from(&[
            ("SAVED_POINTS_MAX_ENTRIES", "lots"),
            ("SAVED_POINTS_QUOTA_FRACTION", ""),
        ]))
        .unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let err = CacheConfig::from_lookup(lookup_from(&[("SAVED_POINTS_QUOTA_FRACTION", "1.5")]))
            .unwrap_err();
        assert!(matches!(err, CacheError::Config(msg) if msg.contains("savedPoints")));

        let mut config = CacheConfig::default();
        config.student_names.quota_fraction = 0.0;
        assert!(config.validate().is_err());
    }
}
