//! The contract between the pipeline and the engine which resolves a partially specified
//! network into instances and attractors.
//!
//! Both operations are pure functions of their inputs: the same model and engine
//! configuration always yield the same instance sequence (with the same keys) and the same
//! ordered attractors for every instance. This makes it possible to substitute the symbolic
//! engine with a literal test double.
//!
//! Attractors of one instance are ordered by their lexicographically smallest state
//! (`false < true`, node order of the `ModelHandle`), ascending, and indexed in that order.

use crate::model::ModelHandle;
use crate::{Attractor, EnrichmentError, Instance};
use serde::Serialize;
use std::collections::BTreeSet;

/// **(internal)** Symbolic detection of terminal strongly connected components.
mod _impl_attractor_search;

/// Grouping of instances by their fixed points.
pub mod fixed_points;
/// `AttractorEngine` backed by `biodivine-lib-param-bn`.
pub mod symbolic;

pub use fixed_points::FixedPointCombinations;
pub use symbolic::SymbolicEngine;

/// A lazy, finite, deterministic sequence of instances.
pub type InstanceIterator<'a> = Box<dyn Iterator<Item = Instance> + 'a>;

/// Resolves a partially specified network into instances and attractors.
///
/// Implementations must be usable from multiple worker threads at once, since the pipeline
/// evaluates independent instances in parallel.
pub trait AttractorEngine: Send + Sync {
    /// Enumerate all instances of the model, in a deterministic order, without duplicates.
    ///
    /// The iterator must be lazy: the enumerator never pulls more instances than it needs.
    fn instances<'a>(
        &'a self,
        model: &'a ModelHandle,
    ) -> Result<InstanceIterator<'a>, EnrichmentError>;

    /// The exact number of instances, if it can be computed without enumerating them.
    fn instance_space_size(&self, _model: &ModelHandle) -> Option<u64> {
        None
    }

    /// Compute the attractors of one instance, in canonical order.
    ///
    /// Fails with `EnrichmentError::Engine` if this instance cannot be resolved.
    fn attractors(
        &self,
        model: &ModelHandle,
        instance: &Instance,
    ) -> Result<Vec<Attractor>, EnrichmentError>;
}

/// An instance together with its (validated) attractors.
#[derive(Clone, Debug, Serialize)]
pub struct InstanceEvaluation {
    instance: Instance,
    attractors: Vec<Attractor>,
}

impl InstanceEvaluation {
    pub fn new(instance: Instance, attractors: Vec<Attractor>) -> InstanceEvaluation {
        InstanceEvaluation {
            instance,
            attractors,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn attractors(&self) -> &[Attractor] {
        &self.attractors
    }
}

/// Sort attractors by their smallest state and assign indices accordingly.
pub fn canonical_order(attractors: &mut [Attractor]) {
    attractors.sort_by(|a, b| a.smallest_state().cmp(b.smallest_state()));
    for (i, attractor) in attractors.iter_mut().enumerate() {
        attractor.set_index(i);
    }
}

/// Check that attractors returned by an engine are consistent with the model and instance.
///
/// Every attractor must belong to the instance, carry its canonical index, assign exactly
/// the model's nodes, and no materialised state can appear in two attractors.
pub fn validate_attractors(
    model: &ModelHandle,
    instance: &Instance,
    attractors: &[Attractor],
) -> Result<(), String> {
    if attractors.is_empty() {
        return Err(format!("Instance {} has no attractors.", instance.key()));
    }
    let mut seen = BTreeSet::new();
    for (i, attractor) in attractors.iter().enumerate() {
        if attractor.instance() != instance.key() {
            return Err(format!(
                "Attractor {} does not belong to instance {}.",
                attractor.id(),
                instance.key()
            ));
        }
        if attractor.index() != i {
            return Err(format!(
                "Attractor {} is not in canonical position {}.",
                attractor.id(),
                i
            ));
        }
        if i > 0 && attractors[i - 1].smallest_state() >= attractor.smallest_state() {
            return Err(format!(
                "Attractors of instance {} are not in canonical order.",
                instance.key()
            ));
        }
        if attractor.states().is_empty() || attractor.state_count() == 0 {
            return Err(format!("Attractor {} is empty.", attractor.id()));
        }
        if attractor.activity().len() != model.num_nodes() {
            return Err(format!(
                "Attractor {} describes {} nodes, model has {}.",
                attractor.id(),
                attractor.activity().len(),
                model.num_nodes()
            ));
        }
        model.check_state(attractor.smallest_state())?;
        for state in attractor.states() {
            model.check_state(state)?;
            if !seen.insert(state.clone()) {
                return Err(format!(
                    "State {} appears in more than one attractor of instance {}.",
                    state,
                    instance.key()
                ));
            }
        }
    }
    Ok(())
}
