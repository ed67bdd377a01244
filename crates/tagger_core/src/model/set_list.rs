//! Ordered, duplicate-free string collection.
//!
//! # Responsibility
//! - Hold entity names produced by store reads and query evaluation.
//! - Provide the set algebra (intersect, diff, union) used by queries.
//!
//! # Invariants
//! - Iteration order is ascending byte-wise string order.
//! - A name appears at most once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sorted set of entity names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetList {
    items: BTreeSet<String>,
}

impl SetList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one name; returns `false` when it was already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.items.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// Keeps only names also present in `other`.
    pub fn intersect(&mut self, other: &SetList) {
        self.items.retain(|name| other.items.contains(name));
    }

    /// Removes every name present in `other`.
    pub fn diff(&mut self, other: &SetList) {
        if other.len() < self.len() {
            for name in &other.items {
                self.items.remove(name);
            }
        } else {
            self.items.retain(|name| !other.items.contains(name));
        }
    }

    /// Adds every name of `other`.
    pub fn union(&mut self, other: SetList) {
        if self.items.is_empty() {
            self.items = other.items;
        } else {
            self.items.extend(other.items);
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.items.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for SetList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for SetList {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        self.items.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for SetList {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
