//! Run configuration, loaded from TOML.
//!
//! Every section and every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [enumeration]
//! cap = 1024
//! overflow = "truncate"
//!
//! [evaluation]
//! workers = 4
//! time_budget_secs = 600
//!
//! [annotation]
//! organism = "10090"
//! aspect = "molecular_function"
//!
//! [aggregation]
//! defining_nodes = "stable"
//! node_filter = { only = ["TP53", "MDM2"] }
//! significance = "hypergeometric"
//! fdr_threshold = 0.05
//!
//! [hierarchy]
//! enabled = true
//!
//! [report]
//! cell_policy = "nodes"
//! ```

use crate::annotation::panther::{DEFAULT_ENDPOINT, DEFAULT_ORGANISM};
use crate::annotation::quickgo;
use crate::annotation::{GoAspect, RetryPolicy};
use crate::engine::symbolic::DEFAULT_MAX_STATES;
use crate::enrichment::{AggregationPolicy, SignificanceKind};
use crate::instances::{EnumerationLimit, OverflowPolicy};
use crate::report::CellPolicy;
use crate::EnrichmentError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub enumeration: EnumerationConfig,
    pub evaluation: EvaluationConfig,
    pub annotation: AnnotationConfig,
    pub aggregation: AggregationConfig,
    pub hierarchy: HierarchyConfig,
    pub report: ReportConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationConfig {
    /// Largest number of instances to evaluate; `None` disables the cap.
    pub cap: Option<usize>,
    pub overflow: OverflowPolicy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub workers: usize,
    pub max_states_per_attractor: usize,
    /// Stop after this many evaluated instances.
    pub max_instances: Option<usize>,
    /// Stop starting new instances after this many seconds.
    pub time_budget_secs: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub endpoint: String,
    pub organism: String,
    pub aspect: GoAspect,
    /// A `node<TAB>term<TAB>label` table used instead of the web service.
    pub table: Option<PathBuf>,
    pub batch_size: usize,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    #[serde(flatten)]
    pub policy: AggregationPolicy,
    pub significance: SignificanceKind,
    pub fdr_threshold: Option<f64>,
}

/// Resolution of root and leaf terms. Timeouts and retries follow `[annotation]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub enabled: bool,
    pub endpoint: String,
    /// A `parent<TAB>child[<TAB>relation]` table used instead of the web service.
    pub table: Option<PathBuf>,
    pub batch_size: usize,
    pub requests_per_second: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub cell_policy: CellPolicy,
    /// Prefix of the exported files; the model file name is used if not set.
    pub name: Option<String>,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        EnumerationConfig {
            cap: Some(10_000),
            overflow: OverflowPolicy::Abort,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            workers: std::thread::available_parallelism()
                .map(|it| it.get())
                .unwrap_or(1),
            max_states_per_attractor: DEFAULT_MAX_STATES,
            max_instances: None,
            time_budget_secs: None,
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        AnnotationConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            organism: DEFAULT_ORGANISM.to_string(),
            aspect: GoAspect::default(),
            table: None,
            batch_size: 100,
            requests_per_second: 5,
            timeout_secs: 30,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        HierarchyConfig {
            enabled: false,
            endpoint: quickgo::DEFAULT_ENDPOINT.to_string(),
            table: None,
            batch_size: 100,
            requests_per_second: 10,
        }
    }
}

impl EnumerationConfig {
    pub fn limit(&self) -> EnumerationLimit {
        match self.cap {
            Some(cap) => EnumerationLimit::capped(cap, self.overflow),
            None => EnumerationLimit::unlimited(),
        }
    }
}

impl EvaluationConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }
}

impl AnnotationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<PipelineConfig, EnrichmentError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, EnrichmentError> {
        let text = std::fs::read_to_string(path)?;
        PipelineConfig::from_toml_str(&text)
    }

    /// Reject settings which would make a run meaningless or stall it.
    pub fn validate(&self) -> Result<(), EnrichmentError> {
        let fail = |message: &str| Err(EnrichmentError::Config(message.to_string()));
        if self.enumeration.cap == Some(0) {
            return fail("enumeration.cap must be positive.");
        }
        if self.evaluation.workers == 0 {
            return fail("evaluation.workers must be positive.");
        }
        if self.evaluation.max_states_per_attractor == 0 {
            return fail("evaluation.max_states_per_attractor must be positive.");
        }
        if self.annotation.batch_size == 0 {
            return fail("annotation.batch_size must be positive.");
        }
        if self.annotation.requests_per_second == 0 {
            return fail("annotation.requests_per_second must be positive.");
        }
        if self.hierarchy.batch_size == 0 {
            return fail("hierarchy.batch_size must be positive.");
        }
        if self.hierarchy.requests_per_second == 0 {
            return fail("hierarchy.requests_per_second must be positive.");
        }
        if let Some(threshold) = self.aggregation.fdr_threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return fail("aggregation.fdr_threshold must be in (0, 1].");
            }
        }
        Ok(())
    }
}
