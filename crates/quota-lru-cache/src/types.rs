//! Core types for the quota-aware cache

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Key/value map of a namespace. Ordered so serialization is canonical.
pub type Entries = BTreeMap<String, Value>;

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Recency of a key that has never been touched. Stored timestamps below it
/// are clamped to it on load, so it sorts as the oldest.
pub const NEVER_USED: Timestamp = 0;

/// Per-key recency tracking for a namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "lastUsed", default)]
    pub last_used: BTreeMap<String, Timestamp>,
}

impl Meta {
    /// Stored shape: `{ "lastUsed": { key: timestamp } }`
    pub fn to_value(&self) -> Value {
        let last_used: Map<String, Value> = self
            .last_used
            .iter()
            .map(|(key, ts)| (key.clone(), Value::from(*ts)))
            .collect();
        let mut root = Map::new();
        root.insert("lastUsed".to_string(), Value::Object(last_used));
        Value::Object(root)
    }
}

/// Backing storage area of the host key/value store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaKind {
    /// Small, synced across devices, with a per-item ceiling
    Sync,
    /// Larger, device-local
    Local,
}

impl AreaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaKind::Sync => "sync",
            AreaKind::Local => "local",
        }
    }
}

impl fmt::Display for AreaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The independently budgeted namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// Remembered rubric points, stored in the sync area
    SavedPoints,
    /// Student display names, stored in the local area
    StudentNames,
}

impl NamespaceKind {
    pub const ALL: [NamespaceKind; 2] = [NamespaceKind::SavedPoints, NamespaceKind::StudentNames];

    /// Storage key holding the entry map
    pub fn storage_key(&self) -> &'static str {
        match self {
            NamespaceKind::SavedPoints => "savedPoints",
            NamespaceKind::StudentNames => "studentNames",
        }
    }

    /// Storage key holding the recency meta
    pub fn meta_key(&self) -> &'static str {
        match self {
            NamespaceKind::SavedPoints => "savedPointsMeta",
            NamespaceKind::StudentNames => "studentNamesMeta",
        }
    }

    pub fn area(&self) -> AreaKind {
        match self {
            NamespaceKind::SavedPoints => AreaKind::Sync,
            NamespaceKind::StudentNames => AreaKind::Local,
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

/// Ceiling a namespace must satisfy after pruning. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_entries: Option<usize>,
    pub max_bytes: Option<u64>,
}

impl Budget {
    pub const UNBOUNDED: Budget = Budget {
        max_entries: None,
        max_bytes: None,
    };

    pub fn new(max_entries: usize, max_bytes: u64) -> Self {
        Self {
            max_entries: Some(max_entries),
            max_bytes: Some(max_bytes),
        }
    }

    pub fn allows_entries(&self, count: usize) -> bool {
        self.max_entries.map_or(true, |max| count <= max)
    }

    pub fn allows_bytes(&self, bytes: u64) -> bool {
        self.max_bytes.map_or(true, |max| bytes <= max)
    }
}

/// Budgets for every namespace kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budgets {
    pub saved_points: Budget,
    pub student_names: Budget,
}

impl Budgets {
    pub fn get(&self, kind: NamespaceKind) -> Budget {
        match kind {
            NamespaceKind::SavedPoints => self.saved_points,
            NamespaceKind::StudentNames => self.student_names,
        }
    }

    pub fn set(&mut self, kind: NamespaceKind, budget: Budget) {
        match kind {
            NamespaceKind::SavedPoints => self.saved_points = budget,
            NamespaceKind::StudentNames => self.student_names = budget,
        }
    }
}

/// Persisted state of a namespace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceSnapshot {
    pub entries: Entries,
    pub meta: Meta,
}

/// Result of pruning a namespace against its budget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneOutcome {
    pub entries: Entries,
    pub meta: Meta,
    /// Keys removed, oldest first
    pub evicted: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_storage_layout() {
        assert_eq!(NamespaceKind::SavedPoints.storage_key(), "savedPoints");
        assert_eq!(NamespaceKind::SavedPoints.meta_key(), "savedPointsMeta");
        assert_eq!(NamespaceKind::SavedPoints.area(), AreaKind::Sync);
        assert_eq!(NamespaceKind::StudentNames.storage_key(), "studentNames");
        assert_eq!(NamespaceKind::StudentNames.meta_key(), "studentNamesMeta");
        assert_eq!(NamespaceKind::StudentNames.area(), AreaKind::Local);
    }

    #[test]
    fn test_budget_limits() {
        let budget = Budget::new(2, 100);
        assert!(budget.allows_entries(2));
        assert!(!budget.allows_entries(3));
        assert!(budget.allows_bytes(100));
        assert!(!budget.allows_bytes(101));

        assert!(Budget::UNBOUNDED.allows_entries(usize::MAX));
        assert!(Budget::UNBOUNDED.allows_bytes(u64::MAX));
    }

    #[test]
    fn test_budgets_get_set() {
        let mut budgets = Budgets {
            saved_points: Budget::new(1, 1),
            student_names: Budget::new(2, 2),
        };
        budgets.set(NamespaceKind::StudentNames, Budget::new(3, 3));
        assert_eq!(budgets.get(NamespaceKind::SavedPoints), Budget::new(1, 1));
        assert_eq!(budgets.get(NamespaceKind::StudentNames), Budget::new(3, 3));
    }

    #[test]
    fn test_meta_stored_shape() {
        let mut meta = Meta::default();
        meta.last_used.insert("a".to_string(), 10);

        let value = meta.to_value();
        assert_eq!(value, serde_json::json!({ "lastUsed": { "a": 10 } }));

        let parsed: Meta = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, meta);
    }
}
