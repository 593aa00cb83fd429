//! Set differences between two labeled collections.
//!
//! Used for file-tree snapshots (keyed by path) and for configuration name
//! lists (agents, skills, ...). Both functions are pure.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

/// Result of comparing two keyed collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedDiff<K> {
    pub added: Vec<K>,
    pub modified: Vec<K>,
    pub deleted: Vec<K>,
}

impl<K> KeyedDiff<K> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Compare two maps ordered by key.
///
/// A key only in `new` is added, a key in both whose value differs under
/// `changed` is modified, and a key only in `old` is deleted. A missing `old`
/// makes every key of `new` an addition. Each list is in key order.
pub fn diff_keyed<K, V, F>(
    old: Option<&BTreeMap<K, V>>,
    new: &BTreeMap<K, V>,
    changed: F,
) -> KeyedDiff<K>
where
    K: Ord + Clone,
    F: Fn(&V, &V) -> bool,
{
    let mut diff = KeyedDiff {
        added: Vec::new(),
        modified: Vec::new(),
        deleted: Vec::new(),
    };

    let Some(old) = old else {
        diff.added = new.keys().cloned().collect();
        return diff;
    };

    for (key, value) in new {
        match old.get(key) {
            None => diff.added.push(key.clone()),
            Some(before) if changed(before, value) => diff.modified.push(key.clone()),
            Some(_) => {}
        }
    }
    diff.deleted = old
        .keys()
        .filter(|key| !new.contains_key(*key))
        .cloned()
        .collect();

    diff
}

/// Membership difference of two lists: `(added, removed)`.
///
/// Added items keep their order in `new`, removed items their order in `old`.
/// Lists have no notion of modification; a rename shows up on both sides.
pub fn diff_items<T>(old: &[T], new: &[T]) -> (Vec<T>, Vec<T>)
where
    T: Eq + Hash + Clone,
{
    let old_set: HashSet<&T> = old.iter().collect();
    let new_set: HashSet<&T> = new.iter().collect();

    let added = new
        .iter()
        .filter(|item| !old_set.contains(item))
        .cloned()
        .collect();
    let removed = old
        .iter()
        .filter(|item| !new_set.contains(item))
        .cloned()
        .collect();

    (added, removed)
}
