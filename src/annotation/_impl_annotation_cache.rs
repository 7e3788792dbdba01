use crate::annotation::{AnnotationSet, AnnotationTerm};
use fxhash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

/// Annotation terms of nodes resolved so far in one pipeline run.
///
/// The cache is safe to share between worker threads. Entries are inserted with an
/// insert-if-absent discipline and never expire: the first answer for a node is kept
/// for the rest of the run.
#[derive(Debug, Default)]
pub struct AnnotationCache {
    entries: RwLock<FxHashMap<String, BTreeSet<AnnotationTerm>>>,
}

impl AnnotationCache {
    pub fn new() -> AnnotationCache {
        AnnotationCache::default()
    }

    pub fn get(&self, node: &str) -> Option<BTreeSet<AnnotationTerm>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(node).cloned()
    }

    pub fn contains(&self, node: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(node)
    }

    /// Store terms of `node` unless it is already cached. Returns `true` if inserted.
    pub fn insert_if_absent(&self, node: &str, terms: BTreeSet<AnnotationTerm>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(node) {
            false
        } else {
            entries.insert(node.to_string(), terms);
            true
        }
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all cached entries.
    pub fn snapshot(&self) -> AnnotationSet {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut result = AnnotationSet::new();
        for (node, terms) in entries.iter() {
            result.insert(node, terms.clone());
        }
        result
    }
}
