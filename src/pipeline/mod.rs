//! The orchestrator which sequences enumeration, evaluation, annotation, aggregation and
//! reporting.
//!
//! A `Pipeline` moves through the states
//! `Loaded -> Enumerated -> Evaluated -> Annotated -> Aggregated -> Reported`, one component
//! call per transition. Failures of single instances or nodes are recorded in
//! `RunDiagnostics` and the run continues; fatal failures move the pipeline to `Aborted`.
//!
//! A run can be cancelled through a `CancellationToken`, or limited by a `RunBudget`. Both
//! are checked before an instance starts evaluating, so every instance is either completely
//! evaluated or recorded as skipped, and later stages only see completed instances.

use crate::annotation::{
    AnnotationCache, AnnotationSet, LookupFailure, OntologyService, TermHierarchy,
};
use crate::config::PipelineConfig;
use crate::engine::{AttractorEngine, InstanceEvaluation};
use crate::enrichment::EnrichmentResults;
use crate::model::ModelHandle;
use crate::report::Report;
use crate::{Instance, InstanceKey};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// **(internal)** Implementation of the individual pipeline steps.
mod _impl_pipeline;
/// **(internal)** Summaries and export of finished runs.
mod _impl_pipeline_run;

pub mod visualization;

pub use visualization::VisualizationData;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum PipelineState {
    Loaded,
    Enumerated,
    Evaluated,
    Annotated,
    Aggregated,
    Reported,
    Aborted,
}

/// Cooperative cancellation of a whole run. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Limits on instance evaluation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunBudget {
    /// Largest number of instances to start.
    pub max_instances: Option<usize>,
    /// Wall-clock time after which no new instance is started.
    pub wall_clock: Option<Duration>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum SkipReason {
    Cancelled,
    BudgetExhausted,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FailedInstance {
    pub index: usize,
    pub key: InstanceKey,
    pub message: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SkippedInstance {
    pub index: usize,
    pub key: InstanceKey,
    pub reason: SkipReason,
}

/// Everything a run absorbed instead of failing.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RunDiagnostics {
    pub failed_instances: Vec<FailedInstance>,
    pub skipped_instances: Vec<SkippedInstance>,
    pub failed_annotations: Vec<LookupFailure>,
    /// The enumeration cap cut the instance space short.
    pub truncated: bool,
    pub duplicate_instances: usize,
    pub annotation_requests: usize,
    pub hierarchy_requests: usize,
    /// Why root and leaf terms could not be resolved.
    pub hierarchy_failure: Option<String>,
}

/// A pipeline run in progress.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    model: ModelHandle,
    engine: &'a dyn AttractorEngine,
    ontology: &'a dyn OntologyService,
    hierarchy: Option<&'a dyn TermHierarchy>,
    cache: AnnotationCache,
    token: CancellationToken,
    budget: RunBudget,
    state: PipelineState,
    instances: Vec<Instance>,
    evaluations: Vec<InstanceEvaluation>,
    annotations: AnnotationSet,
    results: Option<EnrichmentResults>,
    report: Option<Report>,
    diagnostics: RunDiagnostics,
}

/// The artifacts of a finished run.
#[derive(Clone, Debug)]
pub struct PipelineRun {
    pub model: ModelHandle,
    pub instances: Vec<Instance>,
    pub evaluations: Vec<InstanceEvaluation>,
    pub annotations: AnnotationSet,
    pub results: EnrichmentResults,
    pub report: Report,
    pub diagnostics: RunDiagnostics,
    pub visualization: VisualizationData,
}
