//! Client of the QuickGO ontology service, used as a `TermHierarchy`.
//!
//! One request resolves the children of a batch of GO terms:
//! `GET {endpoint}/GO:0000001,GO:0000002/children`. Every result lists its direct children
//! with the relation connecting them.

use crate::annotation::_impl_web_client::RateLimitedClient;
use crate::annotation::hierarchy::{TermHierarchy, TermRelation};
use crate::annotation::panther::GO_ID;
use crate::annotation::LookupError;
use crate::EnrichmentError;
use log::{debug, trace};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://www.ebi.ac.uk/QuickGO/services/ontology/go/terms";
/// Keeps the request path of one batch within common URL length limits.
pub const MAX_BATCH_SIZE: usize = 200;

pub struct QuickGoClient {
    client: RateLimitedClient,
    endpoint: String,
}

impl QuickGoClient {
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<QuickGoClient, EnrichmentError> {
        Ok(QuickGoClient {
            client: RateLimitedClient::new(timeout, requests_per_second)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl TermHierarchy for QuickGoClient {
    fn child_relations(&self, terms: &[String]) -> Result<Vec<TermRelation>, LookupError> {
        // QuickGO rejects the whole batch if one identifier is not a GO id.
        let ids: Vec<&str> = terms
            .iter()
            .map(String::as_str)
            .filter(|it| GO_ID.is_match(it))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Requesting QuickGO children of {} terms.", ids.len());
        let url = format!("{}/{}/children", self.endpoint, ids.join(","));
        let json = self.client.get_json(&url, &[])?;
        parse_children(&json)
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }
}

/// Convert a QuickGO `children` response into relations.
pub(crate) fn parse_children(json: &Value) -> Result<Vec<TermRelation>, LookupError> {
    let results = json
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| LookupError::Permanent("Response has no `results` list.".to_string()))?;
    let mut relations = Vec::new();
    for term in results {
        let Some(parent) = term["id"].as_str() else {
            trace!("Skipping QuickGO result without id.");
            continue;
        };
        for child in term["children"].as_array().into_iter().flatten() {
            if let Some(id) = child["id"].as_str() {
                let relation = child["relation"].as_str().unwrap_or("is_a");
                relations.push(TermRelation::new(parent, id, relation));
            }
        }
    }
    Ok(relations)
}
