//! Tabular reports of enrichment results.
//!
//! Each of the three granularities becomes one `ReportTable`: rows are annotation terms
//! (ordered by term id), columns are scopes (`[whole]`, `[i]` or `[clr:i][att:j]`) and
//! cells are rendered according to a `CellPolicy`. Tables can be exported as CSV.

use crate::annotation::AnnotationTerm;
use crate::enrichment::Granularity;
use serde::{Deserialize, Serialize};

/// **(internal)** Construction of tables from `EnrichmentResults`.
mod _impl_report_builder;
/// **(internal)** CSV serialisation of report tables.
mod _impl_csv_export;

pub use _impl_report_builder::ReportBuilder;

/// What a cell shows for a term present in a column.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellPolicy {
    /// The letter `x`.
    #[default]
    Presence,
    /// The adjusted p-value if a significance test is active, the count otherwise.
    /// `[whole]` cells show the largest adjusted p-value among the instances.
    Score,
    /// Comma separated contributing node ids.
    Nodes,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ReportRow {
    term: AnnotationTerm,
    // One cell per column, `None` if the term is absent from that column.
    cells: Vec<Option<String>>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ReportTable {
    granularity: Granularity,
    columns: Vec<String>,
    rows: Vec<ReportRow>,
}

/// The three tables of one run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Report {
    all_instances: ReportTable,
    per_instance: ReportTable,
    per_attractor: ReportTable,
}

impl ReportRow {
    pub fn term(&self) -> &AnnotationTerm {
        &self.term
    }

    pub fn cells(&self) -> &[Option<String>] {
        &self.cells
    }
}

impl ReportTable {
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn term_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|it| it.term.id()).collect()
    }

    /// Content of the cell at the given term row and column header.
    pub fn cell(&self, term_id: &str, column: &str) -> Option<&str> {
        let column = self.columns.iter().position(|it| it == column)?;
        let row = self.rows.iter().find(|it| it.term.id() == term_id)?;
        row.cells.get(column)?.as_deref()
    }
}

impl Report {
    pub fn table(&self, granularity: Granularity) -> &ReportTable {
        match granularity {
            Granularity::AllInstances => &self.all_instances,
            Granularity::PerInstance => &self.per_instance,
            Granularity::PerAttractor => &self.per_attractor,
        }
    }

    pub fn all_instances(&self) -> &ReportTable {
        &self.all_instances
    }

    pub fn per_instance(&self) -> &ReportTable {
        &self.per_instance
    }

    pub fn per_attractor(&self) -> &ReportTable {
        &self.per_attractor
    }
}
