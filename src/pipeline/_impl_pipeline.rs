use crate::annotation::{
    AnnotationCache, AnnotationMapper, AnnotationSet, HierarchyLookup, OntologyService,
    TermHierarchy,
};
use crate::config::PipelineConfig;
use crate::engine::{validate_attractors, AttractorEngine, InstanceEvaluation};
use crate::enrichment::{EnrichmentAggregator, EnrichmentResults};
use crate::instances::InstanceEnumerator;
use crate::model::ModelHandle;
use crate::pipeline::{
    CancellationToken, FailedInstance, Pipeline, PipelineRun, PipelineState, RunBudget,
    RunDiagnostics, SkipReason, SkippedInstance, VisualizationData,
};
use crate::report::ReportBuilder;
use crate::{EnrichmentError, Instance};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// What happened to one instance during evaluation.
enum Outcome {
    Evaluated(InstanceEvaluation),
    Failed(FailedInstance),
    Skipped(SkippedInstance),
    Fatal(EnrichmentError),
}

/// Shared, read-only state of one evaluation step.
struct EvaluationContext<'a> {
    model: &'a ModelHandle,
    engine: &'a dyn AttractorEngine,
    token: &'a CancellationToken,
    budget: RunBudget,
    started_at: Instant,
    started: AtomicUsize,
}

impl EvaluationContext<'_> {
    fn evaluate(&self, instance: &Instance) -> Outcome {
        let skip = |reason: SkipReason| {
            Outcome::Skipped(SkippedInstance {
                index: instance.index(),
                key: instance.key().clone(),
                reason,
            })
        };
        if self.token.is_cancelled() {
            return skip(SkipReason::Cancelled);
        }
        if let Some(limit) = self.budget.wall_clock {
            if self.started_at.elapsed() >= limit {
                return skip(SkipReason::BudgetExhausted);
            }
        }
        if let Some(max) = self.budget.max_instances {
            let reserved = self
                .started
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    if n < max {
                        Some(n + 1)
                    } else {
                        None
                    }
                });
            if reserved.is_err() {
                return skip(SkipReason::BudgetExhausted);
            }
        }

        let failed = |message: String| {
            Outcome::Failed(FailedInstance {
                index: instance.index(),
                key: instance.key().clone(),
                message,
            })
        };
        debug!("Evaluating instance {}.", instance.key());
        match self.engine.attractors(self.model, instance) {
            Ok(attractors) => match validate_attractors(self.model, instance, &attractors) {
                Ok(()) => Outcome::Evaluated(InstanceEvaluation::new(instance.clone(), attractors)),
                Err(message) => failed(message),
            },
            Err(EnrichmentError::Engine { message, .. }) => failed(message),
            Err(other) => Outcome::Fatal(other),
        }
    }
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline in the `Loaded` state.
    ///
    /// The annotation cache is created here and lives as long as the pipeline.
    pub fn load(
        model: ModelHandle,
        engine: &'a dyn AttractorEngine,
        ontology: &'a dyn OntologyService,
        config: PipelineConfig,
    ) -> Result<Pipeline<'a>, EnrichmentError> {
        config.validate()?;
        let budget = RunBudget {
            max_instances: config.evaluation.max_instances,
            wall_clock: config.evaluation.time_budget(),
        };
        info!(
            "Loaded model `{}` with {} nodes and {} parameter bits.",
            model.name(),
            model.num_nodes(),
            model.key_width()
        );
        Ok(Pipeline {
            config,
            model,
            engine,
            ontology,
            hierarchy: None,
            cache: AnnotationCache::new(),
            token: CancellationToken::new(),
            budget,
            state: PipelineState::Loaded,
            instances: Vec::new(),
            evaluations: Vec::new(),
            annotations: AnnotationSet::new(),
            results: None,
            report: None,
            diagnostics: RunDiagnostics::default(),
        })
    }

    /// Use an externally owned cancellation token (e.g. one shared with a signal handler).
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Pipeline<'a> {
        self.token = token;
        self
    }

    pub fn with_budget(mut self, budget: RunBudget) -> Pipeline<'a> {
        self.budget = budget;
        self
    }

    /// Resolve root and leaf terms of the results using `hierarchy`.
    pub fn with_term_hierarchy(mut self, hierarchy: &'a dyn TermHierarchy) -> Pipeline<'a> {
        self.hierarchy = Some(hierarchy);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn diagnostics(&self) -> &RunDiagnostics {
        &self.diagnostics
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn evaluations(&self) -> &[InstanceEvaluation] {
        &self.evaluations
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    /// `Loaded -> Enumerated`
    pub fn enumerate(&mut self) -> Result<(), EnrichmentError> {
        self.expect_state("enumerate", PipelineState::Loaded)?;
        let enumerator = InstanceEnumerator::new(self.engine, self.config.enumeration.limit());
        let enumerated = match enumerator.enumerate(&self.model) {
            Ok(enumerated) => enumerated,
            Err(e) => return Err(self.abort(e)),
        };
        self.diagnostics.truncated = enumerated.is_truncated();
        self.diagnostics.duplicate_instances = enumerated.duplicates();
        self.instances = enumerated.into_instances();
        info!("Enumerated {} instances.", self.instances.len());
        self.state = PipelineState::Enumerated;
        Ok(())
    }

    /// `Enumerated -> Evaluated`
    ///
    /// Engine failures of single instances are recorded and the instance is excluded from
    /// the rest of the run. Any other engine error aborts the run.
    pub fn evaluate(&mut self) -> Result<(), EnrichmentError> {
        self.expect_state("evaluate", PipelineState::Enumerated)?;
        let workers = self.config.evaluation.workers;
        let context = EvaluationContext {
            model: &self.model,
            engine: self.engine,
            token: &self.token,
            budget: self.budget,
            started_at: Instant::now(),
            started: AtomicUsize::new(0),
        };
        let outcomes: Vec<Outcome> = if workers == 1 {
            self.instances.iter().map(|it| context.evaluate(it)).collect()
        } else {
            let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => pool,
                Err(e) => {
                    let message = format!("Cannot start {} workers: {}", workers, e);
                    return Err(self.abort(EnrichmentError::Config(message)));
                }
            };
            pool.install(|| {
                self.instances
                    .par_iter()
                    .map(|it| context.evaluate(it))
                    .collect()
            })
        };

        let mut evaluations = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Evaluated(evaluation) => evaluations.push(evaluation),
                Outcome::Failed(failed) => {
                    warn!("Instance {} failed: {}", failed.key, failed.message);
                    self.diagnostics.failed_instances.push(failed);
                }
                Outcome::Skipped(skipped) => self.diagnostics.skipped_instances.push(skipped),
                Outcome::Fatal(e) => return Err(self.abort(e)),
            }
        }
        if !self.diagnostics.skipped_instances.is_empty() {
            warn!(
                "{} instances were not evaluated.",
                self.diagnostics.skipped_instances.len()
            );
        }
        info!(
            "Evaluated {} of {} instances.",
            evaluations.len(),
            self.instances.len()
        );
        self.evaluations = evaluations;
        self.state = PipelineState::Evaluated;
        Ok(())
    }

    /// `Evaluated -> Annotated`
    ///
    /// Every model node is annotated, since the whole model is the background of the
    /// significance tests. Nodes whose lookup fails are treated as unannotated.
    pub fn annotate(&mut self) -> Result<(), EnrichmentError> {
        self.expect_state("annotate", PipelineState::Evaluated)?;
        if self.evaluations.is_empty() {
            warn!("No instance was evaluated, annotation skipped.");
        } else {
            let config = &self.config.annotation;
            let outcome = AnnotationMapper::new(self.ontology, &self.cache)
                .with_batch_size(config.batch_size)
                .with_retry(config.retry_policy())
                .map_nodes(&self.model.node_names());
            info!(
                "Annotated {} nodes using {} requests.",
                outcome.annotations.len(),
                outcome.external_calls
            );
            self.diagnostics.annotation_requests += outcome.external_calls;
            self.diagnostics.failed_annotations.extend(outcome.failures);
            self.annotations = outcome.annotations;
        }
        self.state = PipelineState::Annotated;
        Ok(())
    }

    /// `Annotated -> Aggregated`
    ///
    /// If a term hierarchy is set, it is queried once the results are known. A failed
    /// query is recorded in the diagnostics and the results stay without hierarchy.
    pub fn aggregate(&mut self) -> Result<(), EnrichmentError> {
        self.expect_state("aggregate", PipelineState::Annotated)?;
        let config = &self.config.aggregation;
        let aggregated = EnrichmentAggregator::new(&self.model, config.policy.clone())
            .with_significance(config.significance.build(), config.fdr_threshold)
            .aggregate(&self.evaluations, &self.annotations);
        match aggregated {
            Ok(mut results) => {
                self.resolve_hierarchy(&mut results);
                self.results = Some(results);
                self.state = PipelineState::Aggregated;
                Ok(())
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    fn resolve_hierarchy(&mut self, results: &mut EnrichmentResults) {
        let Some(hierarchy) = self.hierarchy else {
            return;
        };
        let terms = results.hierarchy_terms();
        if terms.is_empty() {
            return;
        }
        let outcome = HierarchyLookup::new(hierarchy)
            .with_batch_size(self.config.hierarchy.batch_size)
            .with_retry(self.config.annotation.retry_policy())
            .relations(&terms);
        match outcome {
            Ok(outcome) => {
                info!(
                    "Resolved {} relations among {} terms using {} requests.",
                    outcome.relations.len(),
                    terms.len(),
                    outcome.external_calls
                );
                self.diagnostics.hierarchy_requests += outcome.external_calls;
                results.attach_hierarchy(&outcome.relations);
            }
            Err(e) => {
                warn!("Term hierarchy unavailable: {}", e);
                self.diagnostics.hierarchy_failure = Some(e.to_string());
            }
        }
    }

    /// `Aggregated -> Reported`
    pub fn build_report(&mut self) -> Result<(), EnrichmentError> {
        self.expect_state("build_report", PipelineState::Aggregated)?;
        if let Some(results) = &self.results {
            let report = ReportBuilder::new(self.config.report.cell_policy).build(results);
            self.report = Some(report);
        }
        self.state = PipelineState::Reported;
        Ok(())
    }

    /// Consume a `Reported` pipeline and return its artifacts.
    pub fn finish(self) -> Result<PipelineRun, EnrichmentError> {
        self.expect_state("finish", PipelineState::Reported)?;
        let (results, report) = match (self.results, self.report) {
            (Some(results), Some(report)) => (results, report),
            _ => {
                return Err(EnrichmentError::InvalidState {
                    step: "finish",
                    state: "Reported without results".to_string(),
                })
            }
        };
        let visualization = VisualizationData::from_evaluations(&self.model, &self.evaluations)
            .with_term_graphs(&results);
        Ok(PipelineRun {
            model: self.model,
            instances: self.instances,
            evaluations: self.evaluations,
            annotations: self.annotations,
            results,
            report,
            diagnostics: self.diagnostics,
            visualization,
        })
    }

    /// Execute all steps in order.
    pub fn run(mut self) -> Result<PipelineRun, EnrichmentError> {
        self.enumerate()?;
        self.evaluate()?;
        self.annotate()?;
        self.aggregate()?;
        self.build_report()?;
        self.finish()
    }

    fn expect_state(&self, step: &'static str, expected: PipelineState) -> Result<(), EnrichmentError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EnrichmentError::InvalidState {
                step,
                state: self.state.to_string(),
            })
        }
    }

    fn abort(&mut self, e: EnrichmentError) -> EnrichmentError {
        error!("Pipeline aborted in state {}: {}", self.state, e);
        self.state = PipelineState::Aborted;
        e
    }
}
