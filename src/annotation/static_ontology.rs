//! An offline `OntologyService` backed by an explicit node-to-term table.
//!
//! The table can be loaded from a tab separated file with lines `node<TAB>term<TAB>label`.
//! A line with only a node identifier declares a known node without terms. Lines starting
//! with `#` are ignored.

use crate::annotation::{AnnotationTerm, BatchLookup, LookupError, OntologyService};
use crate::EnrichmentError;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

#[derive(Clone, Debug, Default)]
pub struct StaticOntology {
    terms: BTreeMap<String, BTreeSet<AnnotationTerm>>,
}

impl StaticOntology {
    pub fn new() -> StaticOntology {
        StaticOntology::default()
    }

    pub fn with_term(mut self, node: &str, id: &str, label: &str) -> StaticOntology {
        self.add_term(node, id, label);
        self
    }

    /// Declare a node which is known but carries no terms.
    pub fn with_node(mut self, node: &str) -> StaticOntology {
        self.terms.entry(node.to_string()).or_default();
        self
    }

    pub fn add_term(&mut self, node: &str, id: &str, label: &str) {
        self.terms
            .entry(node.to_string())
            .or_default()
            .insert(AnnotationTerm::new(id, label));
    }

    pub fn from_tsv_file<P: AsRef<Path>>(path: P) -> Result<StaticOntology, EnrichmentError> {
        let file = std::fs::File::open(path)?;
        StaticOntology::from_tsv_reader(file)
    }

    pub fn from_tsv_reader<R: Read>(reader: R) -> Result<StaticOntology, EnrichmentError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(reader);
        let mut ontology = StaticOntology::new();
        for record in reader.records() {
            let record = record?;
            let node = record.get(0).map(str::trim).unwrap_or("");
            if node.is_empty() {
                continue;
            }
            match record.get(1).map(str::trim) {
                Some(id) if !id.is_empty() => {
                    let label = record.get(2).map(str::trim).unwrap_or("");
                    ontology.add_term(node, id, label);
                }
                _ => {
                    ontology.terms.entry(node.to_string()).or_default();
                }
            }
        }
        Ok(ontology)
    }

    pub fn num_nodes(&self) -> usize {
        self.terms.len()
    }
}

impl OntologyService for StaticOntology {
    fn lookup_terms(&self, batch: &[String]) -> Result<BatchLookup, LookupError> {
        let mut lookup = BatchLookup::default();
        for node in batch {
            match self.terms.get(node) {
                Some(terms) => {
                    lookup.found.insert(node.clone(), terms.clone());
                }
                None => {
                    lookup
                        .failed
                        .insert(node.clone(), "Identifier not present in the table.".to_string());
                }
            }
        }
        Ok(lookup)
    }
}
