//! Data consumed by external graph and histogram renderers.
//!
//! Nothing is rendered here. For every instance we expose its attractors with per-node
//! activity and, for every node, the number of attractors in which it is active.
//! When a term hierarchy was resolved, the whole model and every instance also carry the
//! term subgraph of their enrichment results.

use crate::engine::InstanceEvaluation;
use crate::enrichment::{EnrichmentResults, ScopeHierarchy};
use crate::model::ModelHandle;
use crate::{AttractorKind, NodeActivity};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttractorView {
    pub index: usize,
    pub kind: AttractorKind,
    pub state_count: u64,
    pub activity: BTreeMap<String, NodeActivity>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InstanceView {
    pub index: usize,
    pub key: String,
    pub rules: BTreeMap<String, String>,
    pub attractors: Vec<AttractorView>,
    /// Number of this instance's attractors in which each node is active.
    pub node_activity: BTreeMap<String, usize>,
    pub term_graph: Option<ScopeHierarchy>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VisualizationData {
    pub instances: Vec<InstanceView>,
    /// Number of attractors (across all instances) in which each node is active.
    pub activity_frequency: BTreeMap<String, usize>,
    pub attractor_count: usize,
    /// Term subgraph of the terms shared by all instances.
    pub term_graph: Option<ScopeHierarchy>,
}

impl VisualizationData {
    pub fn from_evaluations(
        model: &ModelHandle,
        evaluations: &[InstanceEvaluation],
    ) -> VisualizationData {
        let mut data = VisualizationData::default();
        for name in model.node_names() {
            data.activity_frequency.insert(name, 0);
        }
        for evaluation in evaluations {
            let instance = evaluation.instance();
            let mut view = InstanceView {
                index: instance.index(),
                key: instance.key().to_string(),
                rules: instance.rules().clone(),
                attractors: Vec::new(),
                node_activity: model.node_names().into_iter().map(|it| (it, 0)).collect(),
                term_graph: None,
            };
            for attractor in evaluation.attractors() {
                let activity = attractor
                    .activity()
                    .iter()
                    .enumerate()
                    .map(|(i, it)| (model.node_name(i).to_string(), *it))
                    .collect();
                for node in attractor.active_nodes() {
                    let name = model.node_name(node);
                    *view.node_activity.entry(name.to_string()).or_insert(0) += 1;
                    *data.activity_frequency.entry(name.to_string()).or_insert(0) += 1;
                }
                view.attractors.push(AttractorView {
                    index: attractor.index(),
                    kind: attractor.kind(),
                    state_count: attractor.state_count(),
                    activity,
                });
                data.attractor_count += 1;
            }
            data.instances.push(view);
        }
        data
    }

    /// Copy the term subgraphs of `results` to the matching views.
    pub fn with_term_graphs(mut self, results: &EnrichmentResults) -> VisualizationData {
        self.term_graph = results.all_instances().hierarchy().cloned();
        for scope in results.per_instance() {
            let index = scope.scope().instance();
            if let Some(view) = self.instances.iter_mut().find(|it| Some(it.index) == index) {
                view.term_graph = scope.hierarchy().cloned();
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{AttractorEngine, InstanceEvaluation};
    use crate::pipeline::VisualizationData;
    use crate::annotation::TermRelation;
    use crate::test_utils::{scenario_engine, scenario_model, scenario_results};
    use crate::{AttractorKind, NodeActivity};

    #[test]
    fn scenario_activity() {
        let model = scenario_model();
        let engine = scenario_engine();
        let evaluations: Vec<_> = engine
            .instances(&model)
            .unwrap()
            .map(|it| {
                let attractors = engine.attractors(&model, &it).unwrap();
                InstanceEvaluation::new(it, attractors)
            })
            .collect();
        let data = VisualizationData::from_evaluations(&model, &evaluations);
        assert_eq!(2, data.attractor_count);
        assert_eq!(Some(&2), data.activity_frequency.get("node1"));
        assert_eq!(Some(&1), data.activity_frequency.get("node2"));
        assert_eq!(Some(&1), data.activity_frequency.get("node3"));
        let cycle = &data.instances[1].attractors[0];
        assert_eq!(AttractorKind::Cyclic, cycle.kind);
        assert_eq!(Some(&NodeActivity::Oscillating), cycle.activity.get("node2"));
        assert_eq!(Some(&0), data.instances[0].node_activity.get("node2"));
        assert_eq!("#0", data.instances[0].key);
        assert!(data.term_graph.is_none());

        let mut results = scenario_results();
        let data = data.clone().with_term_graphs(&results);
        assert!(data.term_graph.is_none());
        results.attach_hierarchy(&[TermRelation::new("T1", "T2", "is_a")]);
        let data = data.with_term_graphs(&results);
        assert_eq!(vec!["T1".to_string()], data.term_graph.unwrap().roots);
        let second = data.instances[1].term_graph.as_ref().unwrap();
        assert_eq!(vec!["T2".to_string()], second.leaves);
        assert_eq!(vec![TermRelation::new("T1", "T2", "is_a")], second.relations);
    }
}
