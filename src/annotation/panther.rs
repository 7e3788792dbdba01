//! Client of the PANTHER `geneinfo` web service.
//!
//! One request resolves a whole batch of gene identifiers:
//! `GET {endpoint}?geneInputList=A,B,C&organism=<taxon>&annotationDataSets=<GO root>`.
//!
//! PANTHER serialises a list with one element as a plain object and longer lists as arrays,
//! so every list in the response is read through `as_list`.

use crate::annotation::_impl_web_client::RateLimitedClient;
use crate::annotation::{AnnotationTerm, BatchLookup, GoAspect, LookupError, OntologyService};
use crate::EnrichmentError;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://pantherdb.org/services/oai/pantherdb/geneinfo";
/// NCBI taxon of Homo sapiens.
pub const DEFAULT_ORGANISM: &str = "9606";
/// Largest number of identifiers PANTHER accepts in one request.
pub const MAX_BATCH_SIZE: usize = 1000;

lazy_static! {
    pub(crate) static ref GO_ID: Regex = Regex::new(r"^GO:\d{7}$").unwrap();
}

pub struct PantherClient {
    client: RateLimitedClient,
    endpoint: String,
    organism: String,
    aspect: GoAspect,
}

impl PantherClient {
    /// Create a client with the given request timeout and request rate.
    pub fn new(
        endpoint: &str,
        organism: &str,
        aspect: GoAspect,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<PantherClient, EnrichmentError> {
        Ok(PantherClient {
            client: RateLimitedClient::new(timeout, requests_per_second)?,
            endpoint: endpoint.to_string(),
            organism: organism.to_string(),
            aspect,
        })
    }

    pub fn aspect(&self) -> GoAspect {
        self.aspect
    }
}

impl OntologyService for PantherClient {
    fn lookup_terms(&self, batch: &[String]) -> Result<BatchLookup, LookupError> {
        debug!("Requesting PANTHER annotations of {} genes.", batch.len());
        let query = [
            ("geneInputList", batch.join(",")),
            ("organism", self.organism.clone()),
            ("annotationDataSets", self.aspect.root_term().to_string()),
        ];
        let json = self.client.get_json(&self.endpoint, &query)?;
        parse_gene_info(self.aspect, batch, &json)
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }
}

/// A list in PANTHER's JSON: absent, a single object, or an array.
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Convert a `geneinfo` response into terms of the requested identifiers.
///
/// Requested identifiers are matched to `mapped_id` values case-insensitively. Identifiers
/// which PANTHER lists as unmapped, or which do not appear at all, are reported as failed.
pub(crate) fn parse_gene_info(
    aspect: GoAspect,
    batch: &[String],
    json: &Value,
) -> Result<BatchLookup, LookupError> {
    let search = json
        .get("search")
        .ok_or_else(|| LookupError::Permanent("Response has no `search` object.".to_string()))?;
    if let Some(error) = search.get("error").and_then(Value::as_str) {
        return Err(LookupError::Permanent(error.to_string()));
    }

    // Identifiers differing only in case are distinct nodes with the same gene.
    let mut requested: BTreeMap<String, Vec<&String>> = BTreeMap::new();
    for node in batch {
        requested.entry(node.to_uppercase()).or_default().push(node);
    }
    let mut lookup = BatchLookup::default();

    for gene in as_list(&search["mapped_genes"]["gene"]) {
        let mut terms = BTreeSet::new();
        for data_type in as_list(&gene["annotation_type_list"]["annotation_data_type"]) {
            if data_type["content"].as_str() != Some(aspect.root_term()) {
                continue;
            }
            for annotation in as_list(&data_type["annotation_list"]["annotation"]) {
                let id = annotation["id"].as_str().unwrap_or("");
                if GO_ID.is_match(id) {
                    let label = annotation["name"].as_str().unwrap_or("");
                    terms.insert(AnnotationTerm::new(id, label));
                }
            }
        }
        for mapped in as_list(&gene["mapped_id_list"]["mapped_id"]) {
            let Some(mapped) = mapped.as_str() else {
                continue;
            };
            for node in requested.get(&mapped.to_uppercase()).into_iter().flatten() {
                lookup
                    .found
                    .entry((*node).clone())
                    .or_insert_with(BTreeSet::new)
                    .extend(terms.iter().cloned());
            }
        }
    }

    for unmapped in as_list(&search["unmapped_list"]["unmapped"]) {
        let Some(nodes) = unmapped.as_str().and_then(|it| requested.get(&it.to_uppercase())) else {
            continue;
        };
        for node in nodes {
            if !lookup.found.contains_key(*node) {
                lookup
                    .failed
                    .insert((*node).clone(), "Unmapped by PANTHER.".to_string());
            }
        }
    }
    for node in batch {
        if !lookup.found.contains_key(node) && !lookup.failed.contains_key(node) {
            lookup
                .failed
                .insert(node.clone(), "Missing from PANTHER response.".to_string());
        }
    }
    Ok(lookup)
}
