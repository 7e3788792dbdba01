use crate::annotation::{AnnotationSet, AnnotationTerm};
use crate::engine::InstanceEvaluation;
use crate::enrichment::{
    AggregationPolicy, DefiningNodePolicy, EnrichmentResults, FrequencyOnly, NodeFilter,
    NodeSelection, Scope, ScopeResult, SignificanceTest, TermEnrichment, TermObservation,
};
use crate::enrichment::significance::benjamini_hochberg;
use crate::model::ModelHandle;
use crate::{Attractor, EnrichmentError, Instance};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Terms of a node set: term id to the term and the nodes carrying it.
type NodeTerms = BTreeMap<String, (AnnotationTerm, BTreeSet<String>)>;

/// Annotated model nodes, used as the population of significance tests.
struct Background {
    population: usize,
    term_frequency: BTreeMap<String, usize>,
}

/// Computes `EnrichmentResults` from evaluated instances and node annotations.
pub struct EnrichmentAggregator<'a> {
    model: &'a ModelHandle,
    policy: AggregationPolicy,
    test: Box<dyn SignificanceTest>,
    fdr_threshold: Option<f64>,
    // Nodes admitted by the node filter.
    allowed: Vec<bool>,
}

impl<'a> EnrichmentAggregator<'a> {
    pub fn new(model: &'a ModelHandle, policy: AggregationPolicy) -> EnrichmentAggregator<'a> {
        let mut allowed = vec![false; model.num_nodes()];
        match &policy.node_filter {
            NodeFilter::Any => allowed.iter_mut().for_each(|it| *it = true),
            NodeFilter::Roots => model.roots().into_iter().for_each(|i| allowed[i] = true),
            NodeFilter::Leaves => model.leaves().into_iter().for_each(|i| allowed[i] = true),
            NodeFilter::Only(names) => {
                for name in names {
                    match model.find_node(name) {
                        Some(i) => allowed[i] = true,
                        None => warn!("Node filter references unknown node `{}`.", name),
                    }
                }
            }
        }
        EnrichmentAggregator {
            model,
            policy,
            test: Box::new(FrequencyOnly),
            fdr_threshold: None,
            allowed,
        }
    }

    /// Use `test` to compute p-values. If `fdr_threshold` is set, `PerInstance` and
    /// `PerAttractor` terms whose adjusted p-value exceeds it are dropped.
    pub fn with_significance(
        mut self,
        test: Box<dyn SignificanceTest>,
        fdr_threshold: Option<f64>,
    ) -> EnrichmentAggregator<'a> {
        self.test = test;
        self.fdr_threshold = fdr_threshold;
        self
    }

    pub fn policy(&self) -> &AggregationPolicy {
        &self.policy
    }

    /// Node set of interest of one attractor, restricted by the node filter.
    pub fn selected_nodes(&self, attractor: &Attractor) -> BTreeSet<String> {
        let nodes = match self.policy.node_selection {
            NodeSelection::Active => attractor.active_nodes(),
            NodeSelection::Inactive => attractor.inactive_nodes(),
            NodeSelection::All => (0..attractor.activity().len()).collect(),
        };
        self.names(nodes)
    }

    /// Defining nodes of one attractor, restricted by the node filter.
    pub fn defining_nodes(&self, attractor: &Attractor) -> BTreeSet<String> {
        let nodes = match self.policy.defining_nodes {
            DefiningNodePolicy::StableActive => attractor.stable_active_nodes(),
            DefiningNodePolicy::Stable => attractor.stable_nodes(),
            DefiningNodePolicy::Oscillating => attractor.oscillating_nodes(),
            DefiningNodePolicy::All => (0..attractor.activity().len()).collect(),
        };
        self.names(nodes)
    }

    fn names(&self, nodes: Vec<usize>) -> BTreeSet<String> {
        nodes
            .into_iter()
            .filter(|i| self.allowed.get(*i).copied().unwrap_or(false))
            .map(|i| self.model.node_name(i).to_string())
            .collect()
    }

    /// Aggregate the three result collections.
    ///
    /// The result does not depend on the order of `evaluations`: instances are processed
    /// by their enumeration index. Fails with `AggregationInconsistency` if an evaluation
    /// references a foreign attractor, an instance appears twice, or a node of interest
    /// is missing from `annotations`.
    pub fn aggregate(
        &self,
        evaluations: &[InstanceEvaluation],
        annotations: &AnnotationSet,
    ) -> Result<EnrichmentResults, EnrichmentError> {
        let mut ordered: Vec<&InstanceEvaluation> = evaluations.iter().collect();
        ordered.sort_by(|a, b| {
            let a = a.instance();
            let b = b.instance();
            (a.index(), a.key()).cmp(&(b.index(), b.key()))
        });
        for pair in ordered.windows(2) {
            if pair[0].instance().index() == pair[1].instance().index()
                || pair[0].instance().key() == pair[1].instance().key()
            {
                return Err(EnrichmentError::AggregationInconsistency(format!(
                    "Instance {} is evaluated more than once.",
                    pair[1].instance().key()
                )));
            }
        }

        let background = self.background(annotations);
        let mut per_instance = Vec::with_capacity(ordered.len());
        let mut per_attractor = Vec::new();
        let mut unmapped_frequency: BTreeMap<String, usize> = BTreeMap::new();
        let mut always_unmapped: Option<BTreeSet<String>> = None;

        for evaluation in ordered {
            let instance = evaluation.instance();
            let mut instance_terms: BTreeMap<String, TermEnrichment> = BTreeMap::new();
            let mut instance_nodes = BTreeSet::new();
            let mut instance_unmapped = BTreeSet::new();
            for attractor in evaluation.attractors() {
                self.check_attractor(instance, attractor)?;

                let selected = self.selected_nodes(attractor);
                for (id, (term, nodes)) in self.terms_of(&selected, annotations)? {
                    instance_terms
                        .entry(id)
                        .or_insert_with(|| TermEnrichment::new(term))
                        .add(&nodes, 1);
                }
                for node in selected.iter().filter(|it| !annotations.is_mapped(it)) {
                    *unmapped_frequency.entry(node.clone()).or_insert(0) += 1;
                    instance_unmapped.insert(node.clone());
                }
                instance_nodes.extend(selected);

                let defining = self.defining_nodes(attractor);
                let mut attractor_terms = BTreeMap::new();
                for (id, (term, nodes)) in self.terms_of(&defining, annotations)? {
                    let mut enrichment = TermEnrichment::new(term);
                    enrichment.add(&nodes, nodes.len());
                    attractor_terms.insert(id, enrichment);
                }
                let unmapped = unmapped_in(&defining, annotations);
                let scope = Scope::PerAttractor {
                    instance: instance.index(),
                    attractor: attractor.index(),
                    key: instance.key().clone(),
                };
                per_attractor.push(self.finish(scope, defining, unmapped, attractor_terms, &background));
            }

            always_unmapped = Some(match always_unmapped {
                None => instance_unmapped.clone(),
                Some(previous) => previous.intersection(&instance_unmapped).cloned().collect(),
            });
            let scope = Scope::PerInstance {
                instance: instance.index(),
                key: instance.key().clone(),
            };
            per_instance.push(self.finish(
                scope,
                instance_nodes,
                instance_unmapped,
                instance_terms,
                &background,
            ));
        }

        let all_instances = intersect_instances(&per_instance);
        info!(
            "Aggregated {} instances and {} attractors: {} terms shared by all instances.",
            per_instance.len(),
            per_attractor.len(),
            all_instances.len()
        );
        Ok(EnrichmentResults::new(
            all_instances,
            per_instance,
            per_attractor,
            unmapped_frequency,
            always_unmapped.unwrap_or_default(),
        ))
    }

    fn check_attractor(&self, instance: &Instance, attractor: &Attractor) -> Result<(), EnrichmentError> {
        if attractor.instance() != instance.key() {
            return Err(EnrichmentError::AggregationInconsistency(format!(
                "Attractor {} is listed under instance {}.",
                attractor.id(),
                instance.key()
            )));
        }
        if attractor.activity().len() != self.model.num_nodes() {
            return Err(EnrichmentError::AggregationInconsistency(format!(
                "Attractor {} describes {} nodes, model `{}` has {}.",
                attractor.id(),
                attractor.activity().len(),
                self.model.name(),
                self.model.num_nodes()
            )));
        }
        Ok(())
    }

    fn terms_of(
        &self,
        nodes: &BTreeSet<String>,
        annotations: &AnnotationSet,
    ) -> Result<NodeTerms, EnrichmentError> {
        let mut result: NodeTerms = BTreeMap::new();
        for node in nodes {
            let terms = annotations.get(node).ok_or_else(|| {
                EnrichmentError::AggregationInconsistency(format!(
                    "Node `{}` has no annotation entry.",
                    node
                ))
            })?;
            for term in terms {
                result
                    .entry(term.id().to_string())
                    .or_insert_with(|| (term.clone(), BTreeSet::new()))
                    .1
                    .insert(node.clone());
            }
        }
        Ok(result)
    }

    fn background(&self, annotations: &AnnotationSet) -> Background {
        let mut population = 0;
        let mut term_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for node in self.model.nodes() {
            if let Some(terms) = annotations.get(node.name()) {
                if !terms.is_empty() {
                    population += 1;
                }
                for term in terms {
                    *term_frequency.entry(term.id().to_string()).or_insert(0) += 1;
                }
            }
        }
        Background {
            population,
            term_frequency,
        }
    }

    /// Attach p-values to the terms of one column and apply the FDR threshold.
    fn finish(
        &self,
        scope: Scope,
        nodes: BTreeSet<String>,
        unmapped: BTreeSet<String>,
        mut terms: BTreeMap<String, TermEnrichment>,
        background: &Background,
    ) -> ScopeResult {
        let sample = nodes.len() - unmapped.len();
        let p_values: Option<Vec<f64>> = terms
            .iter()
            .map(|(id, enrichment)| {
                self.test.p_value(&TermObservation {
                    population: background.population,
                    successes: background.term_frequency.get(id).copied().unwrap_or(0),
                    sample,
                    hits: enrichment.nodes().len(),
                })
            })
            .collect();
        if let Some(p_values) = p_values {
            let adjusted = benjamini_hochberg(&p_values);
            for ((enrichment, p), q) in terms.values_mut().zip(p_values).zip(adjusted) {
                enrichment.set_p_values(p, q);
            }
            if let Some(threshold) = self.fdr_threshold {
                terms.retain(|_, it| it.adjusted_p_value().map(|q| q <= threshold).unwrap_or(true));
            }
        }
        ScopeResult::new(scope, nodes, unmapped, terms)
    }
}

fn unmapped_in(nodes: &BTreeSet<String>, annotations: &AnnotationSet) -> BTreeSet<String> {
    nodes
        .iter()
        .filter(|it| !annotations.is_mapped(it))
        .cloned()
        .collect()
}

/// Terms present in every `PerInstance` result. Empty if there are no instances.
///
/// When every instance tested a term, the shared term carries the largest of its
/// per-instance p-values and adjusted p-values: the level at which it is significant
/// in all instances at once.
fn intersect_instances(per_instance: &[ScopeResult]) -> ScopeResult {
    let mut nodes = BTreeSet::new();
    let mut unmapped = BTreeSet::new();
    let mut shared: Option<BTreeSet<String>> = None;
    for result in per_instance {
        nodes.extend(result.nodes().iter().cloned());
        unmapped.extend(result.unmapped_nodes().iter().cloned());
        let ids = result.term_ids();
        shared = Some(match shared {
            None => ids,
            Some(previous) => previous.intersection(&ids).cloned().collect(),
        });
    }
    let mut terms = BTreeMap::new();
    for id in shared.unwrap_or_default() {
        let mut combined: Option<TermEnrichment> = None;
        let mut worst: Option<(f64, f64)> = None;
        let mut tested = true;
        for result in per_instance {
            if let Some(enrichment) = result.get(&id) {
                combined
                    .get_or_insert_with(|| TermEnrichment::new(enrichment.term().clone()))
                    .add(enrichment.nodes(), enrichment.count());
                match (enrichment.p_value(), enrichment.adjusted_p_value()) {
                    (Some(p), Some(q)) => {
                        let (max_p, max_q) = worst.unwrap_or((p, q));
                        worst = Some((max_p.max(p), max_q.max(q)));
                    }
                    _ => tested = false,
                }
            }
        }
        if let Some(mut combined) = combined {
            if let (true, Some((p, q))) = (tested, worst) {
                combined.set_p_values(p, q);
            }
            terms.insert(id, combined);
        }
    }
    ScopeResult::new(Scope::AllInstances, nodes, unmapped, terms)
}

#[cfg(test)]
mod tests {
    use crate::annotation::{
        AnnotationCache, AnnotationMapper, AnnotationSet, AnnotationTerm, RetryPolicy,
    };
    use crate::engine::{canonical_order, AttractorEngine, InstanceEvaluation};
    use crate::enrichment::{
        AggregationPolicy, DefiningNodePolicy, EnrichmentAggregator, Hypergeometric, NodeFilter,
        NodeSelection, Scope,
    };
    use crate::model::{ModelHandle, NodeSpec};
    use crate::test_utils::{key, scenario_engine, scenario_model, scenario_ontology};
    use crate::{Attractor, EnrichmentError, Instance, InstanceKey, State};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn scenario_evaluations() -> Vec<InstanceEvaluation> {
        let model = scenario_model();
        let engine = scenario_engine();
        engine
            .instances(&model)
            .unwrap()
            .map(|instance| {
                let attractors = engine.attractors(&model, &instance).unwrap();
                InstanceEvaluation::new(instance, attractors)
            })
            .collect()
    }

    fn scenario_annotations() -> AnnotationSet {
        let ontology = scenario_ontology();
        let cache = AnnotationCache::new();
        let mapper = AnnotationMapper::new(&ontology, &cache).with_retry(RetryPolicy::none());
        let nodes = scenario_model().node_names();
        mapper.map_nodes(&nodes).annotations
    }

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|it| it.to_string()).collect()
    }

    #[test]
    fn scenario_with_default_policy() {
        let model = scenario_model();
        let aggregator = EnrichmentAggregator::new(&model, AggregationPolicy::default());
        let results = aggregator
            .aggregate(&scenario_evaluations(), &scenario_annotations())
            .unwrap();

        assert_eq!(ids(&["T1"]), results.all_instances().term_ids());
        assert_eq!(2, results.per_instance().len());
        for column in results.per_instance() {
            assert_eq!(ids(&["T1"]), column.term_ids());
        }
        assert_eq!(2, results.per_attractor().len());
        let first = &results.per_attractor()[0];
        assert_eq!(ids(&["T1"]), first.term_ids());
        assert_eq!(&ids(&["node1", "node3"]), first.get("T1").unwrap().nodes());
        assert_eq!(2, first.get("T1").unwrap().count());
        // In the cycle only `node1` is fixed to one.
        let second = &results.per_attractor()[1];
        assert_eq!(ids(&["T1"]), second.term_ids());
        assert_eq!(&ids(&["node1"]), second.get("T1").unwrap().nodes());
        assert_eq!("[clr:1][att:0]", second.scope().column_header());

        // One attractor per instance carries T1.
        assert_eq!(2, results.all_instances().get("T1").unwrap().count());
        assert_eq!(None, results.all_instances().get("T1").unwrap().p_value());
        // `node2` is active only in the cycle and has no terms.
        assert_eq!(Some(&1), results.unmapped_frequency().get("node2"));
        assert!(results.always_unmapped().is_empty());
        assert_eq!(&ids(&["node2"]), results.per_instance()[1].unmapped_nodes());
    }

    #[test]
    fn scenario_with_oscillating_policy() {
        let model = scenario_model();
        let policy = AggregationPolicy {
            node_selection: NodeSelection::All,
            defining_nodes: DefiningNodePolicy::Oscillating,
            node_filter: NodeFilter::Any,
        };
        let aggregator = EnrichmentAggregator::new(&model, policy);
        let results = aggregator
            .aggregate(&scenario_evaluations(), &scenario_annotations())
            .unwrap();
        assert!(results.per_attractor()[0].is_empty());
        assert!(results.per_attractor()[1].is_empty());
        assert_eq!(&ids(&["node2"]), results.per_attractor()[1].nodes());
        assert_eq!(ids(&["T1"]), results.all_instances().term_ids());
        assert_eq!(&ids(&["node2"]), results.always_unmapped());
        assert_eq!(Some(&2), results.unmapped_frequency().get("node2"));
    }

    #[test]
    fn node_filters() {
        let model = scenario_model();
        let only = AggregationPolicy {
            node_filter: NodeFilter::Only(ids(&["node3"])),
            ..AggregationPolicy::default()
        };
        let results = EnrichmentAggregator::new(&model, only)
            .aggregate(&scenario_evaluations(), &scenario_annotations())
            .unwrap();
        assert_eq!(ids(&["T1"]), results.per_attractor()[0].term_ids());
        assert!(results.per_attractor()[1].is_empty());
        // `node3` is inactive in the cycle, so instance B has no terms.
        assert!(results.per_instance()[1].is_empty());
        assert!(results.all_instances().is_empty());

        let roots = AggregationPolicy {
            node_filter: NodeFilter::Roots,
            ..AggregationPolicy::default()
        };
        let aggregator = EnrichmentAggregator::new(&model, roots);
        let evaluations = scenario_evaluations();
        let attractor = &evaluations[0].attractors()[0];
        assert_eq!(ids(&["node1"]), aggregator.selected_nodes(attractor));
        let leaves = AggregationPolicy {
            node_filter: NodeFilter::Leaves,
            ..AggregationPolicy::default()
        };
        let aggregator = EnrichmentAggregator::new(&model, leaves);
        assert_eq!(ids(&["node3"]), aggregator.defining_nodes(attractor));
    }

    #[test]
    fn significance_and_fdr() {
        let model = scenario_model();
        let aggregator = EnrichmentAggregator::new(&model, AggregationPolicy::default())
            .with_significance(Box::new(Hypergeometric), None);
        let results = aggregator
            .aggregate(&scenario_evaluations(), &scenario_annotations())
            .unwrap();
        // Both annotated nodes carry T1, so the observation is certain.
        let first = results.per_attractor()[0].get("T1").unwrap();
        assert_eq!(Some(1.0), first.p_value());
        assert_eq!(Some(1.0), first.adjusted_p_value());

        let strict = EnrichmentAggregator::new(&model, AggregationPolicy::default())
            .with_significance(Box::new(Hypergeometric), Some(0.05));
        let results = strict
            .aggregate(&scenario_evaluations(), &scenario_annotations())
            .unwrap();
        assert!(results.per_attractor().iter().all(|it| it.is_empty()));
        assert!(results.all_instances().is_empty());
    }

    #[test]
    fn shared_terms_carry_the_largest_instance_p_value() {
        let model = scenario_model();
        let aggregator = EnrichmentAggregator::new(&model, AggregationPolicy::default())
            .with_significance(Box::new(Hypergeometric), None);
        let results = aggregator
            .aggregate(&scenario_evaluations(), &scenario_annotations())
            .unwrap();
        let shared = results.all_instances().get("T1").unwrap();
        let largest = results
            .per_instance()
            .iter()
            .filter_map(|it| it.get("T1").and_then(|term| term.adjusted_p_value()))
            .fold(0.0, f64::max);
        assert_eq!(Some(largest), shared.adjusted_p_value());
        assert!(shared.p_value().is_some());
        assert_eq!(2, shared.count());
    }

    #[test]
    fn zero_instances() {
        let model = scenario_model();
        let aggregator = EnrichmentAggregator::new(&model, AggregationPolicy::default());
        let results = aggregator.aggregate(&[], &scenario_annotations()).unwrap();
        assert!(results.all_instances().is_empty());
        assert_eq!(&Scope::AllInstances, results.all_instances().scope());
        assert!(results.per_instance().is_empty());
        assert!(results.always_unmapped().is_empty());
    }

    #[test]
    fn inconsistencies_are_fatal() {
        let model = scenario_model();
        let aggregator = EnrichmentAggregator::new(&model, AggregationPolicy::default());
        let annotations = scenario_annotations();

        let mut evaluations = scenario_evaluations();
        let duplicate = evaluations[0].clone();
        evaluations.push(duplicate);
        let result = aggregator.aggregate(&evaluations, &annotations);
        assert!(matches!(result, Err(EnrichmentError::AggregationInconsistency(_))));

        let foreign = Attractor::from_states(key("1"), 0, vec![State::try_from_bits("101").unwrap()]).unwrap();
        let evaluations = vec![InstanceEvaluation::new(Instance::new(0, key("0")), vec![foreign])];
        let result = aggregator.aggregate(&evaluations, &annotations);
        assert!(matches!(result, Err(EnrichmentError::AggregationInconsistency(_))));

        let result = aggregator.aggregate(&scenario_evaluations(), &AnnotationSet::new());
        assert!(matches!(result, Err(EnrichmentError::AggregationInconsistency(_))));
    }

    #[test]
    fn evaluation_order_does_not_matter() {
        let model = scenario_model();
        let aggregator = EnrichmentAggregator::new(&model, AggregationPolicy::default());
        let annotations = scenario_annotations();
        let forward = aggregator.aggregate(&scenario_evaluations(), &annotations).unwrap();
        let mut reversed = scenario_evaluations();
        reversed.reverse();
        let backward = aggregator.aggregate(&reversed, &annotations).unwrap();
        assert_eq!(forward, backward);
    }

    const NODES: usize = 4;

    fn random_model() -> ModelHandle {
        let nodes = (0..NODES).map(|i| NodeSpec::new(&format!("n{}", i))).collect();
        ModelHandle::new("random", nodes, Vec::new(), 2).unwrap()
    }

    fn random_annotations(terms: &[BTreeSet<u8>]) -> AnnotationSet {
        let mut result = AnnotationSet::new();
        for (i, node_terms) in terms.iter().enumerate() {
            let node_terms = node_terms
                .iter()
                .map(|t| AnnotationTerm::new(&format!("T{}", t), ""))
                .collect();
            result.insert(&format!("n{}", i), node_terms);
        }
        result
    }

    fn random_evaluations(instances: &[Vec<Vec<Vec<bool>>>]) -> Vec<InstanceEvaluation> {
        instances
            .iter()
            .enumerate()
            .map(|(i, attractors)| {
                let key = InstanceKey::new(vec![i & 1 == 1, i & 2 == 2]);
                let mut attractors: Vec<Attractor> = attractors
                    .iter()
                    .map(|states| {
                        let states = states.iter().map(|it| State::new(it.clone())).collect();
                        Attractor::from_states(key.clone(), 0, states).unwrap()
                    })
                    .collect();
                canonical_order(&mut attractors);
                InstanceEvaluation::new(Instance::new(i, key), attractors)
            })
            .collect()
    }

    fn policies() -> impl Strategy<Value = AggregationPolicy> {
        let selection = prop_oneof![
            Just(NodeSelection::Active),
            Just(NodeSelection::Inactive),
            Just(NodeSelection::All)
        ];
        let defining = prop_oneof![
            Just(DefiningNodePolicy::StableActive),
            Just(DefiningNodePolicy::Stable),
            Just(DefiningNodePolicy::Oscillating),
            Just(DefiningNodePolicy::All)
        ];
        (selection, defining).prop_map(|(node_selection, defining_nodes)| AggregationPolicy {
            node_selection,
            defining_nodes,
            node_filter: NodeFilter::Any,
        })
    }

    proptest! {
        #[test]
        fn all_instances_is_shared_by_every_instance(
            terms in prop::collection::vec(prop::collection::btree_set(0u8..5, 0..3), NODES),
            instances in prop::collection::vec(
                prop::collection::vec(
                    prop::collection::vec(prop::collection::vec(any::<bool>(), NODES), 1..3),
                    1..3,
                ),
                0..4,
            ),
            policy in policies(),
        ) {
            let model = random_model();
            let annotations = random_annotations(&terms);
            let evaluations = random_evaluations(&instances);
            let results = EnrichmentAggregator::new(&model, policy)
                .aggregate(&evaluations, &annotations)
                .unwrap();
            let shared = results.all_instances().term_ids();
            for column in results.per_instance() {
                prop_assert!(shared.is_subset(&column.term_ids()));
            }
            if evaluations.is_empty() {
                prop_assert!(shared.is_empty());
            }
        }

        #[test]
        fn attractor_columns_cover_defining_terms(
            terms in prop::collection::vec(prop::collection::btree_set(0u8..5, 0..3), NODES),
            instances in prop::collection::vec(
                prop::collection::vec(
                    prop::collection::vec(prop::collection::vec(any::<bool>(), NODES), 1..3),
                    1..3,
                ),
                1..4,
            ),
            policy in policies(),
        ) {
            let model = random_model();
            let annotations = random_annotations(&terms);
            let evaluations = random_evaluations(&instances);
            let aggregator = EnrichmentAggregator::new(&model, policy);
            let results = aggregator.aggregate(&evaluations, &annotations).unwrap();
            for evaluation in &evaluations {
                let mut defining_terms = BTreeSet::new();
                for attractor in evaluation.attractors() {
                    for node in aggregator.defining_nodes(attractor) {
                        for term in annotations.get(&node).unwrap() {
                            defining_terms.insert(term.id().to_string());
                        }
                    }
                }
                let mut columns = BTreeSet::new();
                for column in results.attractors_of(evaluation.instance().index()) {
                    columns.extend(column.term_ids());
                }
                prop_assert!(defining_terms.is_subset(&columns));
            }
        }
    }
}
