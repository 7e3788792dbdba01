use crate::annotation::{
    AnnotationCache, AnnotationSet, BatchLookup, LookupError, OntologyService,
};
use crate::EnrichmentError;
use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Bounded exponential backoff for transient lookup failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

/// A node whose terms could not be obtained.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct LookupFailure {
    pub node: String,
    pub message: String,
}

/// Result of `AnnotationMapper::map_nodes`.
#[derive(Clone, Debug, Default)]
pub struct MappingOutcome {
    /// Terms of every requested node (failed nodes map to an empty set).
    pub annotations: AnnotationSet,
    /// Nodes which failed during this call. Nodes that failed earlier in the run are
    /// already cached as empty and are not reported again.
    pub failures: Vec<LookupFailure>,
    /// Number of requests sent to the service (including retries).
    pub external_calls: usize,
}

/// Resolves node identifiers to annotation terms through an `OntologyService`, consulting
/// and populating an `AnnotationCache`.
pub struct AnnotationMapper<'a> {
    service: &'a dyn OntologyService,
    cache: &'a AnnotationCache,
    batch_size: usize,
    retry: RetryPolicy,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// Fail on the first transient error.
    pub fn none() -> RetryPolicy {
        RetryPolicy::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (starting at zero).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// **(internal)** Repeat `request` while it fails transiently and retries remain,
    /// sleeping between attempts. Every attempt is counted in `calls`.
    pub(crate) fn run<T, F>(&self, calls: &AtomicUsize, mut request: F) -> Result<T, LookupError>
    where
        F: FnMut() -> Result<T, LookupError>,
    {
        let mut attempt = 0;
        loop {
            calls.fetch_add(1, Ordering::SeqCst);
            match request() {
                Err(LookupError::Transient(message)) if attempt < self.max_retries => {
                    let delay = self.delay(attempt);
                    trace!("Retrying in {:?} ({}).", delay, message);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(8))
    }
}

impl LookupFailure {
    pub fn new(node: &str, message: &str) -> LookupFailure {
        LookupFailure {
            node: node.to_string(),
            message: message.to_string(),
        }
    }

    pub fn to_error(&self) -> EnrichmentError {
        EnrichmentError::AnnotationLookup {
            node: self.node.clone(),
            message: self.message.clone(),
        }
    }
}

impl Display for LookupFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.node, self.message)
    }
}

impl<'a> AnnotationMapper<'a> {
    pub fn new(service: &'a dyn OntologyService, cache: &'a AnnotationCache) -> AnnotationMapper<'a> {
        AnnotationMapper {
            service,
            cache,
            batch_size: 100,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> AnnotationMapper<'a> {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> AnnotationMapper<'a> {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &AnnotationCache {
        self.cache
    }

    /// Return the terms of all given nodes.
    ///
    /// Uncached nodes are split into batches no larger than the configured batch size
    /// (and the service limit). Batches are looked up in parallel. A node which cannot be
    /// resolved is cached with an empty term set and reported as a failure; it never aborts
    /// the whole call.
    pub fn map_nodes(&self, nodes: &[String]) -> MappingOutcome {
        let requested: BTreeSet<&String> = nodes.iter().collect();
        let missing: Vec<String> = requested
            .iter()
            .filter(|it| !self.cache.contains(it))
            .map(|it| (*it).clone())
            .collect();
        let batch_size = self.batch_size.min(self.service.max_batch_size()).max(1);
        debug!(
            "Annotating {} nodes ({} not cached, batch size {}).",
            requested.len(),
            missing.len(),
            batch_size
        );

        let calls = AtomicUsize::new(0);
        let mut failures: Vec<LookupFailure> = missing
            .par_chunks(batch_size)
            .flat_map_iter(|batch| self.resolve_batch(batch, &calls))
            .collect();
        failures.sort();

        let mut annotations = AnnotationSet::new();
        for node in requested {
            annotations.insert(node, self.cache.get(node).unwrap_or_default());
        }
        MappingOutcome {
            annotations,
            failures,
            external_calls: calls.into_inner(),
        }
    }

    /// Look up one batch and store the answers in the cache. Returns nodes that failed.
    fn resolve_batch(&self, batch: &[String], calls: &AtomicUsize) -> Vec<LookupFailure> {
        let mut failures = Vec::new();
        match self.lookup_with_retry(batch, calls) {
            Ok(mut lookup) => {
                for node in batch {
                    if let Some(terms) = lookup.found.remove(node) {
                        self.cache.insert_if_absent(node, terms);
                    } else {
                        let message = lookup
                            .failed
                            .remove(node)
                            .unwrap_or_else(|| "Identifier not recognised.".to_string());
                        failures.push(LookupFailure::new(node, &message));
                    }
                }
            }
            Err(error) => {
                let message = error.to_string();
                failures.extend(batch.iter().map(|node| LookupFailure::new(node, &message)));
            }
        }
        for failure in &failures {
            warn!("{}", failure.to_error());
            self.cache.insert_if_absent(&failure.node, BTreeSet::new());
        }
        failures
    }

    fn lookup_with_retry(
        &self,
        batch: &[String],
        calls: &AtomicUsize,
    ) -> Result<BatchLookup, LookupError> {
        self.retry.run(calls, || self.service.lookup_terms(batch))
    }
}
