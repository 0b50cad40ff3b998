//! Least-recently-used pruning against a namespace budget
//!
//! Candidates are ordered by last use, oldest first. Keys with the same
//! timestamp (commonly several never-used keys) are ordered by key, so the
//! eviction sequence is deterministic for a given namespace state.
//!
//! Both budget dimensions are rechecked after every removal: dropping one
//! large value can satisfy the byte budget long before the entry budget, and
//! the other way round. A budget smaller than an empty map's estimate (4
//! bytes) cannot be met; pruning then empties the namespace and stops.

use crate::recency::normalize;
use crate::size::estimate_bytes;
use crate::types::{Budget, Entries, Meta, PruneOutcome, Timestamp, NEVER_USED};
use tracing::debug;

/// Prune `entries` until they fit `budget`.
///
/// Pure and infallible. `meta` is normalized against `entries` first, so the
/// returned meta always has exactly the returned entries' keys.
pub fn prune(entries: Entries, meta: Meta, budget: &Budget) -> PruneOutcome {
    let meta = normalize(&entries, meta);
    let mut outcome = PruneOutcome {
        entries,
        meta,
        evicted: Vec::new(),
    };
    evict_oldest_until(&mut outcome, |entries, _| within_budget(entries, budget));

    if !within_budget(&outcome.entries, budget) {
        debug!(
            max_bytes = ?budget.max_bytes,
            "Budget is below the size of an empty namespace"
        );
    }

    outcome
}

/// Evict from `outcome` oldest first until `fits` holds or nothing is left.
///
/// `outcome.meta` must already be normalized against `outcome.entries`.
pub(crate) fn evict_oldest_until<F>(outcome: &mut PruneOutcome, fits: F)
where
    F: Fn(&Entries, &Meta) -> bool,
{
    if fits(&outcome.entries, &outcome.meta) {
        return;
    }

    let mut candidates: Vec<(Timestamp, String)> = outcome
        .entries
        .keys()
        .map(|key| {
            let ts = outcome.meta.last_used.get(key).copied().unwrap_or(NEVER_USED);
            (ts, key.clone())
        })
        .collect();
    candidates.sort();

    for (_, key) in candidates {
        if fits(&outcome.entries, &outcome.meta) {
            break;
        }
        outcome.entries.remove(&key);
        outcome.meta.last_used.remove(&key);
        outcome.evicted.push(key);
    }
}

/// Bytes are only estimated once the entry count fits.
fn within_budget(entries: &Entries, budget: &Budget) -> bool {
    budget.allows_entries(entries.len()) && budget.allows_bytes(estimate_bytes(entries))
}
