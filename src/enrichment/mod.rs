//! Aggregation of annotation terms at three granularities.
//!
//! Every result is a `ScopeResult` tagged with its `Scope`:
//!
//!  - `PerAttractor`: terms of the *defining* nodes of one attractor (see
//!    `DefiningNodePolicy`). The count of a term is the number of defining nodes carrying it.
//!  - `PerInstance`: union of the terms of the *selected* nodes (see `NodeSelection`) over
//!    all attractors of one instance. The count of a term is the number of attractors
//!    whose selection carries it.
//!  - `AllInstances`: intersection of the term sets of all `PerInstance` results. The count
//!    of a term is the sum of its `PerInstance` counts.
//!
//! When a term hierarchy is available, the `AllInstances` and `PerInstance` results also
//! carry a `ScopeHierarchy`: the most general and most specific of their terms.
//!
//! Because `AllInstances` is computed from the final `PerInstance` results, it is a subset
//! of every `PerInstance` term set by construction. Both scope kinds also pass through
//! the node filter, so the `PerAttractor` terms of one instance cover the terms contributed
//! by the defining nodes of that instance.

use crate::annotation::{AnnotationTerm, TermRelation};
use crate::InstanceKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// **(internal)** Implementation of `EnrichmentAggregator`.
mod _impl_aggregator;
/// **(internal)** Utility methods of `Scope`, `ScopeResult` and `EnrichmentResults`.
mod _impl_scope_result;

pub mod significance;

pub use _impl_aggregator::EnrichmentAggregator;
pub use significance::{
    FrequencyOnly, Hypergeometric, SignificanceKind, SignificanceTest, TermObservation,
};

/// The three report granularities.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    AllInstances,
    PerInstance,
    PerAttractor,
}

/// The portion of the results a `ScopeResult` describes.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Scope {
    AllInstances,
    PerInstance {
        instance: usize,
        key: InstanceKey,
    },
    PerAttractor {
        instance: usize,
        attractor: usize,
        key: InstanceKey,
    },
}

/// Which nodes of an attractor form the node set of interest of `PerInstance` results.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSelection {
    /// Nodes with value `1` in at least one state of the attractor.
    #[default]
    Active,
    /// Nodes with value `0` in at least one state of the attractor.
    Inactive,
    All,
}

/// Which nodes define an attractor for `PerAttractor` results.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefiningNodePolicy {
    /// Nodes fixed to `1` in every state of the attractor.
    #[default]
    StableActive,
    /// Nodes fixed to any value.
    Stable,
    Oscillating,
    All,
}

/// Restriction of both node sets to a subset of the model nodes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeFilter {
    #[default]
    Any,
    Only(BTreeSet<String>),
    /// Nodes without regulators.
    Roots,
    /// Nodes which do not regulate any other node.
    Leaves,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationPolicy {
    pub node_selection: NodeSelection,
    pub defining_nodes: DefiningNodePolicy,
    pub node_filter: NodeFilter,
}

/// One term in one scope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TermEnrichment {
    term: AnnotationTerm,
    nodes: BTreeSet<String>,
    count: usize,
    p_value: Option<f64>,
    adjusted_p_value: Option<f64>,
}

/// Terms of one scope, keyed by term id.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScopeResult {
    scope: Scope,
    nodes: BTreeSet<String>,
    unmapped: BTreeSet<String>,
    terms: BTreeMap<String, TermEnrichment>,
    hierarchy: Option<ScopeHierarchy>,
}

/// The ontology subgraph induced by the terms of one scope.
///
/// `roots` have no parent and `leaves` no child among the terms of the scope. Both are
/// ordered by adjusted p-value (untested terms last), then by decreasing count.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ScopeHierarchy {
    pub roots: Vec<String>,
    pub leaves: Vec<String>,
    pub relations: Vec<TermRelation>,
}

/// The three result collections of one run, plus unmapped-node bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnrichmentResults {
    all_instances: ScopeResult,
    per_instance: Vec<ScopeResult>,
    per_attractor: Vec<ScopeResult>,
    // For each unmapped node, the number of attractors whose selection contains it.
    unmapped_frequency: BTreeMap<String, usize>,
    // Unmapped nodes selected in every instance.
    always_unmapped: BTreeSet<String>,
}
