//! Literal test doubles shared by the unit tests of this crate.

use crate::annotation::{
    AnnotationCache, AnnotationMapper, BatchLookup, LookupError, OntologyService, RetryPolicy,
    StaticOntology,
};
use crate::engine::{canonical_order, AttractorEngine, InstanceEvaluation, InstanceIterator};
use crate::enrichment::{
    AggregationPolicy, EnrichmentAggregator, EnrichmentResults, Hypergeometric, SignificanceTest,
};
use crate::model::{ModelHandle, NodeSpec, ParameterSpec};
use crate::{Attractor, EnrichmentError, Instance, InstanceKey, State};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Parse a key written as a bit string, e.g. `"01"`.
pub fn key(bits: &str) -> InstanceKey {
    InstanceKey::new(bits.chars().map(|it| it == '1').collect())
}

/// An engine returning a fixed list of instances and attractors.
pub struct FixedEngine {
    instances: Vec<Instance>,
    attractors: BTreeMap<InstanceKey, Result<Vec<Vec<String>>, String>>,
    size_hint: Option<u64>,
    pulled: AtomicUsize,
    evaluated: AtomicUsize,
}

impl FixedEngine {
    pub fn new() -> FixedEngine {
        FixedEngine {
            instances: Vec::new(),
            attractors: BTreeMap::new(),
            size_hint: None,
            pulled: AtomicUsize::new(0),
            evaluated: AtomicUsize::new(0),
        }
    }

    /// Add an instance whose attractors are given as lists of states (bit strings).
    pub fn with_instance(mut self, bits: &str, attractors: &[&[&str]]) -> FixedEngine {
        let key = key(bits);
        let index = self.instances.len();
        self.instances.push(Instance::new(index, key.clone()));
        let attractors = attractors
            .iter()
            .map(|states| states.iter().map(|it| it.to_string()).collect())
            .collect();
        self.attractors.insert(key, Ok(attractors));
        self
    }

    /// Add an instance which the engine cannot resolve.
    pub fn with_failure(mut self, bits: &str, message: &str) -> FixedEngine {
        let key = key(bits);
        let index = self.instances.len();
        self.instances.push(Instance::new(index, key.clone()));
        self.attractors.insert(key, Err(message.to_string()));
        self
    }

    pub fn with_size_hint(mut self, size: u64) -> FixedEngine {
        self.size_hint = Some(size);
        self
    }

    /// Number of instances pulled from all enumerations so far.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    /// Number of `attractors` calls so far.
    pub fn evaluated(&self) -> usize {
        self.evaluated.load(Ordering::SeqCst)
    }
}

impl AttractorEngine for FixedEngine {
    fn instances<'a>(
        &'a self,
        _model: &'a ModelHandle,
    ) -> Result<InstanceIterator<'a>, EnrichmentError> {
        Ok(Box::new(self.instances.iter().cloned().inspect(move |_| {
            self.pulled.fetch_add(1, Ordering::SeqCst);
        })))
    }

    fn instance_space_size(&self, _model: &ModelHandle) -> Option<u64> {
        self.size_hint
    }

    fn attractors(
        &self,
        _model: &ModelHandle,
        instance: &Instance,
    ) -> Result<Vec<Attractor>, EnrichmentError> {
        self.evaluated.fetch_add(1, Ordering::SeqCst);
        let engine_error = |message: String| EnrichmentError::Engine {
            instance: instance.key().clone(),
            message,
        };
        let listed = self
            .attractors
            .get(instance.key())
            .ok_or_else(|| engine_error("Unknown instance.".to_string()))?
            .clone()
            .map_err(engine_error)?;
        let mut result = Vec::new();
        for states in listed {
            let states = states
                .iter()
                .map(|it| State::try_from_bits(it))
                .collect::<Result<Vec<_>, _>>()
                .map_err(engine_error)?;
            let attractor = Attractor::from_states(instance.key().clone(), 0, states)
                .map_err(engine_error)?;
            result.push(attractor);
        }
        canonical_order(&mut result);
        Ok(result)
    }
}

/// Counts requests forwarded to an inner service.
pub struct CountingOntology<S: OntologyService> {
    inner: S,
    calls: AtomicUsize,
    largest_batch: AtomicUsize,
}

impl<S: OntologyService> CountingOntology<S> {
    pub fn new(inner: S) -> CountingOntology<S> {
        CountingOntology {
            inner,
            calls: AtomicUsize::new(0),
            largest_batch: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn largest_batch(&self) -> usize {
        self.largest_batch.load(Ordering::SeqCst)
    }
}

impl<S: OntologyService> OntologyService for CountingOntology<S> {
    fn lookup_terms(&self, batch: &[String]) -> Result<BatchLookup, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.largest_batch.fetch_max(batch.len(), Ordering::SeqCst);
        self.inner.lookup_terms(batch)
    }
}

/// Three nodes, `node2` depends on one free parameter bit.
pub fn scenario_model() -> ModelHandle {
    let nodes = vec![
        NodeSpec::new("node1").with_rule("true"),
        NodeSpec::new("node2").with_regulators(&["node1"]),
        NodeSpec::new("node3")
            .with_regulators(&["node1", "node2"])
            .with_rule("node1 & !node2"),
    ];
    let parameters = vec![ParameterSpec::new("node2", 1, true)];
    ModelHandle::new("scenario", nodes, parameters, 1).unwrap()
}

/// Instance A (`#0`) has the fixed point `101`, instance B (`#1`) cycles between
/// `100` and `110`.
pub fn scenario_engine() -> FixedEngine {
    FixedEngine::new()
        .with_instance("0", &[&["101"]])
        .with_instance("1", &[&["100", "110"]])
        .with_size_hint(2)
}

/// `node1` and `node3` carry `T1`, `node2` is known but has no terms.
pub fn scenario_ontology() -> StaticOntology {
    StaticOntology::new()
        .with_term("node1", "T1", "term one")
        .with_term("node3", "T1", "term one")
        .with_node("node2")
}

/// Enrichment results of the scenario with default policies, where `node2` additionally
/// carries `T2`.
pub fn scenario_results() -> EnrichmentResults {
    scenario_results_with(None)
}

/// `scenario_results` with p-values from the hypergeometric test.
pub fn scenario_tested_results() -> EnrichmentResults {
    scenario_results_with(Some(Box::new(Hypergeometric)))
}

fn scenario_results_with(test: Option<Box<dyn SignificanceTest>>) -> EnrichmentResults {
    let model = scenario_model();
    let engine = scenario_engine();
    let evaluations: Vec<_> = engine
        .instances(&model)
        .unwrap()
        .map(|instance| {
            let attractors = engine.attractors(&model, &instance).unwrap();
            InstanceEvaluation::new(instance, attractors)
        })
        .collect();
    let ontology = scenario_ontology().with_term("node2", "T2", "term two");
    let cache = AnnotationCache::new();
    let annotations = AnnotationMapper::new(&ontology, &cache)
        .with_retry(RetryPolicy::none())
        .map_nodes(&model.node_names())
        .annotations;
    let mut aggregator = EnrichmentAggregator::new(&model, AggregationPolicy::default());
    if let Some(test) = test {
        aggregator = aggregator.with_significance(test, None);
    }
    aggregator
        .aggregate(&evaluations, &annotations)
        .unwrap()
}
