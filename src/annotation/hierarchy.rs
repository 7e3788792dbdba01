//! Parent/child relations between annotation terms.
//!
//! A `TermHierarchy` answers which terms are direct children of a batch of terms (QuickGO, or
//! a static table). `HierarchyLookup` batches and retries these requests and keeps only the
//! relations *among* the requested terms. A `TermGraph` is then the subgraph of the ontology
//! induced by one set of terms, with its roots (no parent in the set) and leaves (no child
//! in the set).

use crate::annotation::{LookupError, RetryPolicy};
use crate::EnrichmentError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::AtomicUsize;

/// `child` is related to `parent` by `relation` (e.g. `is_a`, `part_of`).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct TermRelation {
    pub parent: String,
    pub child: String,
    pub relation: String,
}

/// A source of term relations.
pub trait TermHierarchy: Send + Sync {
    /// Direct child relations of every term in `terms`. Children outside `terms` may be
    /// included; they are filtered out by the caller.
    fn child_relations(&self, terms: &[String]) -> Result<Vec<TermRelation>, LookupError>;

    /// Largest batch the service accepts.
    fn max_batch_size(&self) -> usize {
        usize::MAX
    }
}

/// Relations among a set of terms together with the number of requests it took.
#[derive(Clone, Debug, Default)]
pub struct HierarchyOutcome {
    pub relations: Vec<TermRelation>,
    pub external_calls: usize,
}

/// Resolves the relations among a set of terms through a `TermHierarchy`.
pub struct HierarchyLookup<'a> {
    hierarchy: &'a dyn TermHierarchy,
    batch_size: usize,
    retry: RetryPolicy,
}

/// Subgraph of the term hierarchy induced by one set of terms.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct TermGraph {
    terms: BTreeSet<String>,
    relations: BTreeSet<TermRelation>,
}

/// An offline `TermHierarchy` backed by an explicit `parent<TAB>child<TAB>relation` table.
#[derive(Clone, Debug, Default)]
pub struct StaticHierarchy {
    relations: BTreeSet<TermRelation>,
}

impl TermRelation {
    pub fn new(parent: &str, child: &str, relation: &str) -> TermRelation {
        TermRelation {
            parent: parent.to_string(),
            child: child.to_string(),
            relation: relation.to_string(),
        }
    }
}

impl<'a> HierarchyLookup<'a> {
    pub fn new(hierarchy: &'a dyn TermHierarchy) -> HierarchyLookup<'a> {
        HierarchyLookup {
            hierarchy,
            batch_size: 100,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> HierarchyLookup<'a> {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> HierarchyLookup<'a> {
        self.retry = retry;
        self
    }

    /// Relations whose parent and child both belong to `terms`.
    ///
    /// Unlike node annotation, the hierarchy is all-or-nothing: a batch which still fails
    /// after retries fails the whole lookup.
    pub fn relations(&self, terms: &BTreeSet<String>) -> Result<HierarchyOutcome, LookupError> {
        let terms: Vec<String> = terms.iter().cloned().collect();
        let batch_size = self.batch_size.min(self.hierarchy.max_batch_size()).max(1);
        let calls = AtomicUsize::new(0);
        let mut relations = BTreeSet::new();
        for batch in terms.chunks(batch_size) {
            let found = self
                .retry
                .run(&calls, || self.hierarchy.child_relations(batch))?;
            relations.extend(found.into_iter().filter(|it| {
                it.parent != it.child
                    && terms.binary_search(&it.parent).is_ok()
                    && terms.binary_search(&it.child).is_ok()
            }));
        }
        debug!(
            "Found {} relations among {} terms.",
            relations.len(),
            terms.len()
        );
        Ok(HierarchyOutcome {
            relations: relations.into_iter().collect(),
            external_calls: calls.into_inner(),
        })
    }
}

impl TermGraph {
    /// The subgraph induced by `terms`: relations with an endpoint outside `terms` are
    /// dropped.
    pub fn new<I: IntoIterator<Item = String>>(terms: I, relations: &[TermRelation]) -> TermGraph {
        let terms: BTreeSet<String> = terms.into_iter().collect();
        let relations = relations
            .iter()
            .filter(|it| {
                it.parent != it.child && terms.contains(&it.parent) && terms.contains(&it.child)
            })
            .cloned()
            .collect();
        TermGraph { terms, relations }
    }

    pub fn terms(&self) -> &BTreeSet<String> {
        &self.terms
    }

    pub fn relations(&self) -> &BTreeSet<TermRelation> {
        &self.relations
    }

    pub fn parents(&self, term: &str) -> BTreeSet<&str> {
        self.relations
            .iter()
            .filter(|it| it.child == term)
            .map(|it| it.parent.as_str())
            .collect()
    }

    pub fn children(&self, term: &str) -> BTreeSet<&str> {
        self.relations
            .iter()
            .filter(|it| it.parent == term)
            .map(|it| it.child.as_str())
            .collect()
    }

    /// Terms without a parent in this graph.
    pub fn roots(&self) -> BTreeSet<&str> {
        let children: BTreeSet<&str> = self.relations.iter().map(|it| it.child.as_str()).collect();
        self.terms
            .iter()
            .map(String::as_str)
            .filter(|it| !children.contains(it))
            .collect()
    }

    /// Terms without a child in this graph.
    pub fn leaves(&self) -> BTreeSet<&str> {
        let parents: BTreeSet<&str> = self.relations.iter().map(|it| it.parent.as_str()).collect();
        self.terms
            .iter()
            .map(String::as_str)
            .filter(|it| !parents.contains(it))
            .collect()
    }
}

impl StaticHierarchy {
    pub fn new() -> StaticHierarchy {
        StaticHierarchy::default()
    }

    pub fn with_relation(mut self, parent: &str, child: &str, relation: &str) -> StaticHierarchy {
        self.relations.insert(TermRelation::new(parent, child, relation));
        self
    }

    pub fn from_tsv_file<P: AsRef<Path>>(path: P) -> Result<StaticHierarchy, EnrichmentError> {
        let file = std::fs::File::open(path)?;
        StaticHierarchy::from_tsv_reader(file)
    }

    /// Read lines `parent<TAB>child[<TAB>relation]`. The relation defaults to `is_a`.
    pub fn from_tsv_reader<R: Read>(reader: R) -> Result<StaticHierarchy, EnrichmentError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(reader);
        let mut hierarchy = StaticHierarchy::new();
        for record in reader.records() {
            let record = record?;
            let parent = record.get(0).map(str::trim).unwrap_or("");
            let child = record.get(1).map(str::trim).unwrap_or("");
            if parent.is_empty() || child.is_empty() {
                continue;
            }
            let relation = match record.get(2).map(str::trim) {
                Some(relation) if !relation.is_empty() => relation,
                _ => "is_a",
            };
            hierarchy
                .relations
                .insert(TermRelation::new(parent, child, relation));
        }
        Ok(hierarchy)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

impl TermHierarchy for StaticHierarchy {
    fn child_relations(&self, terms: &[String]) -> Result<Vec<TermRelation>, LookupError> {
        Ok(self
            .relations
            .iter()
            .filter(|it| terms.contains(&it.parent))
            .cloned()
            .collect())
    }
}
