//! Last-used tracking ("meta") for namespace keys
//!
//! After [`normalize`], the keys of `meta.last_used` are exactly the keys of
//! the namespace's entries. Keys without a recorded use carry [`NEVER_USED`].

use crate::types::{Entries, Meta, Timestamp, NEVER_USED};
use serde_json::Value;
use tracing::debug;

/// Coerce a stored meta value into a valid shape.
///
/// Anything that is not `{ "lastUsed": { ... } }` becomes an empty meta.
/// Timestamps that are not numbers are dropped. Negative ones are clamped to
/// [`NEVER_USED`].
pub fn ensure_meta(raw: Option<&Value>) -> Meta {
    let Some(Value::Object(root)) = raw else {
        return Meta::default();
    };
    let Some(Value::Object(last_used)) = root.get("lastUsed") else {
        debug!("Meta has no lastUsed object, resetting");
        return Meta::default();
    };

    let last_used = last_used
        .iter()
        .filter_map(|(key, value)| timestamp_from_value(value).map(|ts| (key.clone(), ts)))
        .collect();

    Meta { last_used }
}

fn timestamp_from_value(value: &Value) -> Option<Timestamp> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f as Timestamp)
    })
    .map(|ts| ts.max(NEVER_USED))
}

/// Drop timestamps for keys no longer in `entries` and record untouched keys
/// as never used.
pub fn normalize(entries: &Entries, mut meta: Meta) -> Meta {
    meta.last_used.retain(|key, _| entries.contains_key(key));
    for key in entries.keys() {
        meta.last_used.entry(key.clone()).or_insert(NEVER_USED);
    }
    meta
}

/// Mark `keys` as used at `now`. Empty keys are ignored.
pub fn touch<I, K>(mut meta: Meta, keys: I, now: Timestamp) -> Meta
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    for key in keys {
        let key: &str = key.as_ref();
        if !key.is_empty() {
            meta.last_used.insert(key.to_string(), now);
        }
    }
    meta
}
