//! Error taxonomy of the enrichment pipeline.
//!
//! Failures local to a single instance or node (`Engine`, `AnnotationLookup`) are normally
//! absorbed by the pipeline and reported in its diagnostics. `ResourceExceeded`, `Model` and
//! `AggregationInconsistency` abort the whole run.

use crate::InstanceKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The instance space is larger than the configured enumeration cap.
    #[error("Instance space exceeds the configured cap of {cap} instances ({observed}).")]
    ResourceExceeded { cap: usize, observed: String },

    /// The attractor engine cannot resolve one instance.
    #[error("Engine failed on instance {instance}: {message}")]
    Engine {
        instance: InstanceKey,
        message: String,
    },

    /// Annotation terms of a node cannot be obtained, even after retries.
    #[error("Annotation lookup failed for node `{node}`: {message}")]
    AnnotationLookup { node: String, message: String },

    /// Aggregation references an instance or attractor missing from upstream results.
    #[error("Aggregation inconsistency: {0}")]
    AggregationInconsistency(String),

    /// The model cannot be loaded or is empty.
    #[error("Invalid model: {0}")]
    Model(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A pipeline step was invoked in a state that does not permit it.
    #[error("Pipeline step `{step}` is not allowed in state {state}.")]
    InvalidState { step: &'static str, state: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EnrichmentError {
    /// True for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EnrichmentError::Engine { .. } | EnrichmentError::AnnotationLookup { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{EnrichmentError, InstanceKey};

    #[test]
    fn fatal_classification() {
        let engine = EnrichmentError::Engine {
            instance: InstanceKey::new(vec![true]),
            message: "malformed rule".to_string(),
        };
        assert!(!engine.is_fatal());
        assert_eq!("Engine failed on instance #1: malformed rule", engine.to_string());
        let exceeded = EnrichmentError::ResourceExceeded {
            cap: 4,
            observed: "at least 5".to_string(),
        };
        assert!(exceeded.is_fatal());
        assert!(EnrichmentError::AggregationInconsistency("x".to_string()).is_fatal());
    }
}
