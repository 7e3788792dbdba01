//! Mapping of network nodes to functional annotation terms.
//!
//! Terms are obtained from an `OntologyService` (the PANTHER web service or a static table)
//! through an `AnnotationMapper`, which batches requests, retries transient failures and
//! stores every answer in an `AnnotationCache`. The cache lives exactly as long as one
//! pipeline run and is keyed purely by node identifier, so the same node always maps to
//! the same terms regardless of the instance in which it appears.
//!
//! Relations between the terms themselves (the GO hierarchy) are provided by a separate
//! `TermHierarchy` (QuickGO, or a static table), see the `hierarchy` module.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// **(internal)** Implementation of the concurrent `AnnotationCache`.
mod _impl_annotation_cache;
/// **(internal)** Batching, retries and failure bookkeeping of `AnnotationMapper`.
mod _impl_annotation_mapper;
/// **(internal)** Rate limited JSON requests shared by the web service clients.
mod _impl_web_client;

pub mod hierarchy;
pub mod panther;
pub mod quickgo;
pub mod static_ontology;

pub use _impl_annotation_cache::AnnotationCache;
pub use _impl_annotation_mapper::{AnnotationMapper, LookupFailure, MappingOutcome, RetryPolicy};
pub use hierarchy::{HierarchyLookup, StaticHierarchy, TermGraph, TermHierarchy, TermRelation};
pub use panther::PantherClient;
pub use quickgo::QuickGoClient;
pub use static_ontology::StaticOntology;

/// One annotation term: an identifier (e.g. `GO:0006915`) and a human readable label.
///
/// Terms are ordered (and compared) by identifier first.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct AnnotationTerm {
    id: String,
    label: String,
}

impl AnnotationTerm {
    pub fn new(id: &str, label: &str) -> AnnotationTerm {
        AnnotationTerm {
            id: id.to_string(),
            label: label.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Display for AnnotationTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.label)
    }
}

/// Annotation terms of a collection of nodes.
///
/// A node which is present with an empty term set is known, but has no annotation
/// (either genuinely or because its lookup failed).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AnnotationSet {
    terms: BTreeMap<String, BTreeSet<AnnotationTerm>>,
}

impl AnnotationSet {
    pub fn new() -> AnnotationSet {
        AnnotationSet::default()
    }

    pub fn insert(&mut self, node: &str, terms: BTreeSet<AnnotationTerm>) {
        self.terms.insert(node.to_string(), terms);
    }

    /// Terms of `node`, or `None` if the node is not covered by this set.
    pub fn get(&self, node: &str) -> Option<&BTreeSet<AnnotationTerm>> {
        self.terms.get(node)
    }

    /// True if `node` carries at least one term.
    pub fn is_mapped(&self, node: &str) -> bool {
        self.terms.get(node).map(|it| !it.is_empty()).unwrap_or(false)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &String> {
        self.terms.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<AnnotationTerm>)> {
        self.terms.iter()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// All distinct terms carried by any node.
    pub fn all_terms(&self) -> BTreeSet<AnnotationTerm> {
        self.terms.values().flatten().cloned().collect()
    }
}

/// Answer of an `OntologyService` for one batch of node identifiers.
///
/// Nodes missing from both maps are treated as failed by the mapper.
#[derive(Clone, Debug, Default)]
pub struct BatchLookup {
    pub found: BTreeMap<String, BTreeSet<AnnotationTerm>>,
    pub failed: BTreeMap<String, String>,
}

/// Failure of a whole batch request.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LookupError {
    /// Worth retrying (timeouts, rate limits, server errors).
    #[error("Transient lookup failure: {0}")]
    Transient(String),
    #[error("Permanent lookup failure: {0}")]
    Permanent(String),
}

/// A source of annotation terms.
pub trait OntologyService: Send + Sync {
    /// Look up terms of a batch of node identifiers.
    fn lookup_terms(&self, batch: &[String]) -> Result<BatchLookup, LookupError>;

    /// Largest batch the service accepts.
    fn max_batch_size(&self) -> usize {
        usize::MAX
    }
}

/// The Gene Ontology aspect used for annotation.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoAspect {
    MolecularFunction,
    #[default]
    BiologicalProcess,
    CellularComponent,
}

impl GoAspect {
    /// The GO root term which identifies this aspect.
    pub fn root_term(&self) -> &'static str {
        match self {
            GoAspect::MolecularFunction => "GO:0003674",
            GoAspect::BiologicalProcess => "GO:0008150",
            GoAspect::CellularComponent => "GO:0005575",
        }
    }
}

impl FromStr for GoAspect {
    type Err = String;

    fn from_str(value: &str) -> Result<GoAspect, String> {
        match value.to_lowercase().as_str() {
            "mf" | "molecular_function" => Ok(GoAspect::MolecularFunction),
            "bp" | "biological_process" => Ok(GoAspect::BiologicalProcess),
            "cc" | "cellular_component" => Ok(GoAspect::CellularComponent),
            _ => Err(format!("Unknown GO aspect `{}` (expected bp, mf or cc).", value)),
        }
    }
}
