//! Small collection helpers reused across the pipeline, conflict
//! resolution, and QI grouping stages.

use std::collections::HashMap;
use std::hash::Hash;

/// Groups a `Vec` by a key extracted from each item, preserving per-group
/// insertion order. Used by the detection pipeline's conflict resolution
/// (group candidates by `piiType`) and by correlation grouping.
#[inline]
pub fn group_by<T, K, F>(items: Vec<T>, key_fn: F) -> HashMap<K, Vec<T>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut map: HashMap<K, Vec<T>> = HashMap::new();
    for item in items {
        map.entry(key_fn(&item)).or_default().push(item);
    }
    map
}
