//! Attractor analysis and Gene Ontology enrichment for partially specified Boolean networks.
//!
//! A partially specified network leaves some update functions open. Every admissible
//! resolution of these open parts is an `Instance`. For each instance, we compute the
//! attractors of its asynchronous state-transition graph, map the nodes that characterise
//! these attractors to annotation terms and aggregate the terms at three granularities:
//! across all instances, per instance and per attractor.
//!
//! The crate is organised bottom-up:
//!
//!  - `model`: the immutable `ModelHandle` describing nodes and free parameters.
//!  - `engine`: the `AttractorEngine` contract and its symbolic implementation.
//!  - `instances`: the capped, deterministic `InstanceEnumerator`.
//!  - `annotation`: the `AnnotationMapper`, its per-run cache and ontology services.
//!  - `enrichment`: the `EnrichmentAggregator` and pluggable significance tests.
//!  - `report`: tabular reports ready for export.
//!  - `pipeline`: the orchestrator which sequences all of the above.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod annotation;
pub mod config;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod instances;
pub mod model;
pub mod pipeline;
pub mod report;

/// **(internal)** Utility methods for `Attractor` and `NodeActivity`.
mod _impl_attractor;
/// **(internal)** Utility methods for `Instance` and `InstanceKey`.
mod _impl_instance;
/// **(internal)** Utility methods for `State`.
mod _impl_state;

#[cfg(test)]
mod test_utils;

pub use error::EnrichmentError;

/// A stable identifier of one `Instance`.
///
/// The key is the ordered tuple of values of all free parameter bits declared by the
/// `ModelHandle`. Re-enumerating the same model yields the same keys, so results of
/// different runs can be compared key by key.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct InstanceKey(Vec<bool>);

/// One concrete resolution of all free choices of a partially specified network.
///
/// Besides its key, an instance remembers its position in the enumeration (`index`, used for
/// report columns) and a human readable rendering of the update rule chosen for each
/// parametrised node (if the engine provides one).
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Instance {
    index: usize,
    key: InstanceKey,
    rules: BTreeMap<String, String>,
}

/// A total assignment of Boolean values to all nodes of a model.
///
/// Values are stored in the node order of the `ModelHandle`. States are ordered
/// lexicographically with `false < true`, which is the canonical state ordering used
/// to sort attractors.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct State(Vec<bool>);

/// Behaviour of a single node inside one attractor.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum NodeActivity {
    /// The node has the same value in every state of the attractor.
    Fixed(bool),
    /// The node takes both values within the attractor.
    Oscillating,
}

/// Attractors of size one are fixed points, every larger attractor is cyclic.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum AttractorKind {
    FixedPoint,
    Cyclic,
}

/// Identifies an attractor by its instance and its position within that instance.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AttractorId {
    instance: InstanceKey,
    index: usize,
}

/// A closed, non-escapable set of states of one instance.
///
/// The explicit `states` are sorted in canonical order and can be truncated for very large
/// attractors (`state_count` is always the full size). `activity` summarises each node
/// across the *whole* attractor, independent of truncation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Attractor {
    id: AttractorId,
    smallest_state: State,
    states: Vec<State>,
    state_count: u64,
    activity: Vec<NodeActivity>,
}
