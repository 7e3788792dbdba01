use crate::annotation::{AnnotationTerm, TermGraph, TermRelation};
use crate::enrichment::{
    EnrichmentResults, Granularity, Scope, ScopeHierarchy, ScopeResult, TermEnrichment,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

impl Scope {
    pub fn granularity(&self) -> Granularity {
        match self {
            Scope::AllInstances => Granularity::AllInstances,
            Scope::PerInstance { .. } => Granularity::PerInstance,
            Scope::PerAttractor { .. } => Granularity::PerAttractor,
        }
    }

    /// Index of the instance this scope belongs to, if any.
    pub fn instance(&self) -> Option<usize> {
        match self {
            Scope::AllInstances => None,
            Scope::PerInstance { instance, .. } => Some(*instance),
            Scope::PerAttractor { instance, .. } => Some(*instance),
        }
    }

    /// Report column header: `[whole]`, `[i]` or `[clr:i][att:j]`.
    pub fn column_header(&self) -> String {
        match self {
            Scope::AllInstances => "[whole]".to_string(),
            Scope::PerInstance { instance, .. } => format!("[{}]", instance),
            Scope::PerAttractor {
                instance,
                attractor,
                ..
            } => format!("[clr:{}][att:{}]", instance, attractor),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::AllInstances => write!(f, "all instances"),
            Scope::PerInstance { key, .. } => write!(f, "instance {}", key),
            Scope::PerAttractor { key, attractor, .. } => {
                write!(f, "attractor {}/{}", key, attractor)
            }
        }
    }
}

impl TermEnrichment {
    pub(crate) fn new(term: AnnotationTerm) -> TermEnrichment {
        TermEnrichment {
            term,
            nodes: BTreeSet::new(),
            count: 0,
            p_value: None,
            adjusted_p_value: None,
        }
    }

    pub(crate) fn add(&mut self, nodes: &BTreeSet<String>, count: usize) {
        self.nodes.extend(nodes.iter().cloned());
        self.count += count;
    }

    pub(crate) fn set_p_values(&mut self, p_value: f64, adjusted: f64) {
        self.p_value = Some(p_value);
        self.adjusted_p_value = Some(adjusted);
    }

    pub fn term(&self) -> &AnnotationTerm {
        &self.term
    }

    /// Nodes which contributed this term.
    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn p_value(&self) -> Option<f64> {
        self.p_value
    }

    pub fn adjusted_p_value(&self) -> Option<f64> {
        self.adjusted_p_value
    }
}

impl ScopeResult {
    pub(crate) fn new(
        scope: Scope,
        nodes: BTreeSet<String>,
        unmapped: BTreeSet<String>,
        terms: BTreeMap<String, TermEnrichment>,
    ) -> ScopeResult {
        ScopeResult {
            scope,
            nodes,
            unmapped,
            terms,
            hierarchy: None,
        }
    }

    /// Compute the `ScopeHierarchy` of this scope from ontology `relations`. Relations
    /// which do not connect two terms of this scope are ignored.
    pub(crate) fn attach_hierarchy(&mut self, relations: &[TermRelation]) {
        let graph = TermGraph::new(self.terms.keys().cloned(), relations);
        let roots = self.ranked(graph.roots());
        let leaves = self.ranked(graph.leaves());
        self.hierarchy = Some(ScopeHierarchy {
            roots,
            leaves,
            relations: graph.relations().iter().cloned().collect(),
        });
    }

    fn ranked(&self, ids: BTreeSet<&str>) -> Vec<String> {
        let mut ranked: Vec<&TermEnrichment> =
            ids.into_iter().filter_map(|id| self.terms.get(id)).collect();
        ranked.sort_by(|a, b| rank(a, b).then_with(|| a.term.id().cmp(b.term.id())));
        ranked.into_iter().map(|it| it.term.id().to_string()).collect()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The node set analysed in this scope.
    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    /// Analysed nodes with at least one term.
    pub fn mapped_nodes(&self) -> BTreeSet<String> {
        self.nodes.difference(&self.unmapped).cloned().collect()
    }

    /// Analysed nodes without any term.
    pub fn unmapped_nodes(&self) -> &BTreeSet<String> {
        &self.unmapped
    }

    pub fn terms(&self) -> &BTreeMap<String, TermEnrichment> {
        &self.terms
    }

    pub fn term_ids(&self) -> BTreeSet<String> {
        self.terms.keys().cloned().collect()
    }

    pub fn get(&self, term_id: &str) -> Option<&TermEnrichment> {
        self.terms.get(term_id)
    }

    pub fn contains(&self, term_id: &str) -> bool {
        self.terms.contains_key(term_id)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Root and leaf terms, if a term hierarchy was resolved for this scope.
    pub fn hierarchy(&self) -> Option<&ScopeHierarchy> {
        self.hierarchy.as_ref()
    }
}

/// Smaller adjusted p-values first, then larger counts.
fn rank(a: &TermEnrichment, b: &TermEnrichment) -> Ordering {
    let a_q = a.adjusted_p_value.unwrap_or(f64::INFINITY);
    let b_q = b.adjusted_p_value.unwrap_or(f64::INFINITY);
    a_q.total_cmp(&b_q).then_with(|| b.count.cmp(&a.count))
}

impl EnrichmentResults {
    pub(crate) fn new(
        all_instances: ScopeResult,
        per_instance: Vec<ScopeResult>,
        per_attractor: Vec<ScopeResult>,
        unmapped_frequency: BTreeMap<String, usize>,
        always_unmapped: BTreeSet<String>,
    ) -> EnrichmentResults {
        EnrichmentResults {
            all_instances,
            per_instance,
            per_attractor,
            unmapped_frequency,
            always_unmapped,
        }
    }

    pub fn all_instances(&self) -> &ScopeResult {
        &self.all_instances
    }

    pub fn per_instance(&self) -> &[ScopeResult] {
        &self.per_instance
    }

    pub fn per_attractor(&self) -> &[ScopeResult] {
        &self.per_attractor
    }

    /// All results of one granularity, in column order.
    pub fn scopes(&self, granularity: Granularity) -> &[ScopeResult] {
        match granularity {
            Granularity::AllInstances => std::slice::from_ref(&self.all_instances),
            Granularity::PerInstance => &self.per_instance,
            Granularity::PerAttractor => &self.per_attractor,
        }
    }

    /// `PerAttractor` results of the instance with the given index.
    pub fn attractors_of(&self, instance: usize) -> impl Iterator<Item = &ScopeResult> {
        self.per_attractor
            .iter()
            .filter(move |it| it.scope.instance() == Some(instance))
    }

    /// Every distinct term of the three collections.
    pub fn all_terms(&self) -> BTreeMap<String, AnnotationTerm> {
        let mut result = BTreeMap::new();
        let scopes = std::iter::once(&self.all_instances)
            .chain(self.per_instance.iter())
            .chain(self.per_attractor.iter());
        for scope in scopes {
            for (id, enrichment) in &scope.terms {
                result
                    .entry(id.clone())
                    .or_insert_with(|| enrichment.term.clone());
            }
        }
        result
    }

    pub fn unmapped_frequency(&self) -> &BTreeMap<String, usize> {
        &self.unmapped_frequency
    }

    pub fn always_unmapped(&self) -> &BTreeSet<String> {
        &self.always_unmapped
    }

    /// Terms of the `AllInstances` and `PerInstance` results, the scopes which carry a
    /// `ScopeHierarchy`.
    pub fn hierarchy_terms(&self) -> BTreeSet<String> {
        let mut result = self.all_instances.term_ids();
        for scope in &self.per_instance {
            result.extend(scope.terms.keys().cloned());
        }
        result
    }

    pub(crate) fn attach_hierarchy(&mut self, relations: &[TermRelation]) {
        self.all_instances.attach_hierarchy(relations);
        for scope in self.per_instance.iter_mut() {
            scope.attach_hierarchy(relations);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::annotation::{AnnotationTerm, TermRelation};
    use crate::enrichment::{Granularity, Scope, ScopeResult, TermEnrichment};
    use crate::test_utils::scenario_results;
    use crate::InstanceKey;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};

    fn enrichment(id: &str, count: usize, q: Option<f64>) -> (String, TermEnrichment) {
        let mut result = TermEnrichment::new(AnnotationTerm::new(id, ""));
        result.add(&BTreeSet::new(), count);
        if let Some(q) = q {
            result.set_p_values(q, q);
        }
        (id.to_string(), result)
    }

    #[test]
    fn hierarchy_roots_and_leaves_are_ranked() {
        let terms: BTreeMap<String, TermEnrichment> = [
            enrichment("GO:1", 1, Some(0.5)),
            enrichment("GO:2", 3, None),
            enrichment("GO:3", 1, Some(0.01)),
            enrichment("GO:4", 5, Some(0.01)),
            enrichment("GO:5", 2, None),
        ]
        .into_iter()
        .collect();
        let mut scope = ScopeResult::new(Scope::AllInstances, BTreeSet::new(), BTreeSet::new(), terms);
        assert!(scope.hierarchy().is_none());
        // GO:1 -> GO:3, GO:1 -> GO:4; GO:2 and GO:5 are isolated. GO:9 is not in the scope.
        let relations = vec![
            TermRelation::new("GO:1", "GO:3", "is_a"),
            TermRelation::new("GO:1", "GO:4", "part_of"),
            TermRelation::new("GO:9", "GO:1", "is_a"),
        ];
        scope.attach_hierarchy(&relations);
        let hierarchy = scope.hierarchy().unwrap();
        assert_eq!(vec!["GO:1", "GO:2", "GO:5"], hierarchy.roots);
        assert_eq!(vec!["GO:4", "GO:3", "GO:2", "GO:5"], hierarchy.leaves);
        assert_eq!(relations[..2].to_vec(), hierarchy.relations);
    }

    #[test]
    fn hierarchy_covers_instance_scopes() {
        let mut results = scenario_results();
        let terms = results.hierarchy_terms();
        assert_eq!(
            BTreeSet::from(["T1".to_string(), "T2".to_string()]),
            terms
        );
        results.attach_hierarchy(&[TermRelation::new("T1", "T2", "is_a")]);
        let whole = results.all_instances().hierarchy().unwrap();
        assert_eq!(vec!["T1"], whole.roots);
        assert_eq!(vec!["T1"], whole.leaves);
        assert!(whole.relations.is_empty());
        let second = results.per_instance()[1].hierarchy().unwrap();
        assert_eq!(vec!["T1"], second.roots);
        assert_eq!(vec!["T2"], second.leaves);
        assert!(results.per_attractor().iter().all(|it| it.hierarchy().is_none()));
    }

    #[test]
    fn column_headers() {
        let key = InstanceKey::new(vec![true]);
        assert_eq!("[whole]", Scope::AllInstances.column_header());
        let instance = Scope::PerInstance {
            instance: 3,
            key: key.clone(),
        };
        assert_eq!("[3]", instance.column_header());
        assert_eq!(Granularity::PerInstance, instance.granularity());
        let attractor = Scope::PerAttractor {
            instance: 3,
            attractor: 12,
            key,
        };
        assert_eq!("[clr:3][att:12]", attractor.column_header());
        assert_eq!(Some(3), attractor.instance());
        assert_eq!("attractor #1/12", attractor.to_string());
    }
}
