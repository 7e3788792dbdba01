//! The immutable description of a partially specified network, as seen by the pipeline.
//!
//! A `ModelHandle` does not know how update rules are represented or evaluated; it only
//! records the node set, the regulatory structure and which nodes carry free parameters.
//! Instances and attractors produced by an engine are validated against it.

use fxhash::FxHashMap;

/// **(internal)** Construction, validation and structural queries of `ModelHandle`.
mod _impl_model_handle;

/// A node of the network (typically a gene or a protein).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeSpec {
    name: String,
    regulators: Vec<String>,
    rule: Option<String>,
    parametrised: bool,
}

/// A free parameter of the network.
///
/// Explicit parameters are uninterpreted functions named in update rules; implicit
/// parameters stand for the entire unknown update function of one node (and carry
/// the node's name).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParameterSpec {
    name: String,
    arity: u32,
    implicit: bool,
}

/// Immutable description of a partially specified network.
#[derive(Clone, Debug)]
pub struct ModelHandle {
    name: String,
    nodes: Vec<NodeSpec>,
    parameters: Vec<ParameterSpec>,
    // Number of parameter bits in every `InstanceKey` of this model.
    key_width: usize,
    node_index: FxHashMap<String, usize>,
}
