//! Change reporting between two versions of a namespace

use crate::types::{Entries, NamespaceKind};
use serde_json::Value;
use std::collections::BTreeMap;

/// Before and after values of one key. `None` means absent.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryChange {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Keys whose values differ between `old` and `new`, including additions and removals
pub fn diff_entries(old: &Entries, new: &Entries) -> BTreeMap<String, EntryChange> {
    let mut changes = BTreeMap::new();

    for (key, old_value) in old {
        let new_value = new.get(key);
        if new_value != Some(old_value) {
            changes.insert(
                key.clone(),
                EntryChange {
                    old: Some(old_value.clone()),
                    new: new_value.cloned(),
                },
            );
        }
    }

    for (key, new_value) in new {
        if !old.contains_key(key) {
            changes.insert(
                key.clone(),
                EntryChange {
                    old: None,
                    new: Some(new_value.clone()),
                },
            );
        }
    }

    changes
}

/// Whether `key` is the recency record of one of the namespaces
pub fn is_meta_key(key: &str) -> bool {
    NamespaceKind::ALL.iter().any(|kind| kind.meta_key() == key)
}

/// True when every changed store key is a recency record.
///
/// Such changes carry no user-visible data and are not worth propagating.
/// An empty change set is not meta-only.
pub fn is_meta_only<I, K>(changed_keys: I) -> bool
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    let mut any = false;
    for key in changed_keys {
        let key: &str = key.as_ref();
        if !is_meta_key(key) {
            return false;
        }
        any = true;
    }
    any
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(pairs: &[(&str, Value)]) -> Entries {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_diff_reports_changed_added_removed() {
        let old = entries(&[("same", json!(1)), ("changed", json!("a")), ("gone", json!(true))]);
        let new = entries(&[("same", json!(1)), ("changed", json!("b")), ("added", json!([1]))]);

        let diff = diff_entries(&old, &new);
        assert_eq!(diff.len(), 3);
        assert_eq!(
            diff["changed"],
            EntryChange {
                old: Some(json!("a")),
                new: Some(json!("b"))
            }
        );
        assert_eq!(diff["gone"].new, None);
        assert_eq!(diff["added"].old, None);
        assert!(!diff.contains_key("same"));
    }

    #[test]
    fn test_diff_of_identical_maps_is_empty() {
        let map = entries(&[("a", json!({ "x": 1 }))]);
        assert!(diff_entries(&map, &map).is_empty());
    }

    #[test]
    fn test_meta_keys() {
        for kind in NamespaceKind::ALL {
            assert!(is_meta_key(kind.meta_key()));
            assert!(!is_meta_key(kind.storage_key()));
        }
        assert!(!is_meta_key("Meta"));
        assert!(!is_meta_key("settingsMeta"));
    }

    #[test]
    fn test_meta_only_changes() {
        assert!(is_meta_only(["savedPointsMeta"]));
        assert!(is_meta_only(["savedPointsMeta", "studentNamesMeta"]));
        assert!(!is_meta_only(["savedPointsMeta", "savedPoints"]));
        assert!(!is_meta_only(["themeMeta"]));
        assert!(!is_meta_only(Vec::<String>::new()));
    }
}
