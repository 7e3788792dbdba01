use crate::annotation::AnnotationTerm;
use crate::enrichment::{EnrichmentResults, Granularity, TermEnrichment};
use crate::report::{CellPolicy, Report, ReportRow, ReportTable};
use std::collections::BTreeMap;

/// Turns `EnrichmentResults` into a `Report` without changing its content.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReportBuilder {
    cell_policy: CellPolicy,
}

impl ReportBuilder {
    pub fn new(cell_policy: CellPolicy) -> ReportBuilder {
        ReportBuilder { cell_policy }
    }

    pub fn build(&self, results: &EnrichmentResults) -> Report {
        let terms = results.all_terms();
        Report {
            all_instances: self.table(results, Granularity::AllInstances, &terms),
            per_instance: self.table(results, Granularity::PerInstance, &terms),
            per_attractor: self.table(results, Granularity::PerAttractor, &terms),
        }
    }

    /// One table; `terms` is the report-wide term index shared by all three tables.
    fn table(
        &self,
        results: &EnrichmentResults,
        granularity: Granularity,
        terms: &BTreeMap<String, AnnotationTerm>,
    ) -> ReportTable {
        let scopes = results.scopes(granularity);
        let columns = scopes.iter().map(|it| it.scope().column_header()).collect();
        let rows = terms
            .iter()
            .filter(|(id, _)| scopes.iter().any(|it| it.contains(id)))
            .map(|(id, term)| ReportRow {
                term: term.clone(),
                cells: scopes
                    .iter()
                    .map(|scope| scope.get(id).map(|it| self.render(it)))
                    .collect(),
            })
            .collect();
        ReportTable {
            granularity,
            columns,
            rows,
        }
    }

    fn render(&self, enrichment: &TermEnrichment) -> String {
        match self.cell_policy {
            CellPolicy::Presence => "x".to_string(),
            CellPolicy::Score => match enrichment.adjusted_p_value() {
                Some(q) => format!("{:.3e}", q),
                None => enrichment.count().to_string(),
            },
            CellPolicy::Nodes => enrichment
                .nodes()
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::report::{CellPolicy, ReportBuilder};
    use crate::test_utils::{scenario_results, scenario_tested_results};
    use pretty_assertions::assert_eq;

    #[test]
    fn scenario_tables() {
        let report = ReportBuilder::new(CellPolicy::Presence).build(&scenario_results());

        let whole = report.all_instances();
        assert_eq!(vec!["[whole]".to_string()], whole.columns());
        assert_eq!(vec!["T1"], whole.term_ids());
        assert_eq!(Some("x"), whole.cell("T1", "[whole]"));

        let instances = report.per_instance();
        assert_eq!(vec!["[0]".to_string(), "[1]".to_string()], instances.columns());
        assert_eq!(vec!["T1", "T2"], instances.term_ids());
        assert_eq!(None, instances.cell("T2", "[0]"));
        assert_eq!(Some("x"), instances.cell("T2", "[1]"));

        let attractors = report.per_attractor();
        assert_eq!(
            vec!["[clr:0][att:0]".to_string(), "[clr:1][att:0]".to_string()],
            attractors.columns()
        );
        assert_eq!(vec!["T1"], attractors.term_ids());
    }

    #[test]
    fn cell_policies() {
        let results = scenario_results();
        let nodes = ReportBuilder::new(CellPolicy::Nodes).build(&results);
        assert_eq!(
            Some("node1,node3"),
            nodes.per_attractor().cell("T1", "[clr:0][att:0]")
        );
        let scores = ReportBuilder::new(CellPolicy::Score).build(&results);
        assert_eq!(Some("2"), scores.per_attractor().cell("T1", "[clr:0][att:0]"));
        assert_eq!(Some("1"), scores.per_attractor().cell("T1", "[clr:1][att:0]"));
        assert_eq!(Some("2"), scores.all_instances().cell("T1", "[whole]"));
    }

    #[test]
    fn scores_with_significance() {
        let results = scenario_tested_results();
        let scores = ReportBuilder::new(CellPolicy::Score).build(&results);
        let whole = scores.all_instances().cell("T1", "[whole]").unwrap();
        let first = scores.per_instance().cell("T1", "[0]").unwrap();
        assert!(whole.contains('e'), "{}", whole);
        assert!(first.contains('e'), "{}", first);
        let expected = results.all_instances().get("T1").unwrap().adjusted_p_value().unwrap();
        assert_eq!(format!("{:.3e}", expected), whole);
    }
}
