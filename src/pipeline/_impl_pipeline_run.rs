use crate::pipeline::{
    PipelineRun, PipelineState, RunDiagnostics, SkipReason, VisualizationData,
};
use crate::EnrichmentError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Content of the exported `<name>_summary.json`.
#[derive(Serialize)]
struct RunSummary<'a> {
    model: &'a str,
    instances: usize,
    evaluated_instances: usize,
    attractors: usize,
    /// Number of attractors whose selection contains each unmapped node.
    unmapped_frequency: &'a BTreeMap<String, usize>,
    always_unmapped: &'a BTreeSet<String>,
    diagnostics: &'a RunDiagnostics,
    visualization: &'a VisualizationData,
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::BudgetExhausted => write!(f, "budget exhausted"),
        }
    }
}

impl RunDiagnostics {
    /// True if every enumerated instance and every node was processed.
    pub fn is_complete(&self) -> bool {
        self.failed_instances.is_empty()
            && self.skipped_instances.is_empty()
            && self.failed_annotations.is_empty()
            && self.hierarchy_failure.is_none()
            && !self.truncated
    }
}

impl Display for RunDiagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.truncated {
            writeln!(f, "Instance enumeration was truncated.")?;
        }
        if self.duplicate_instances > 0 {
            writeln!(f, "Dropped duplicate instances: {}", self.duplicate_instances)?;
        }
        writeln!(f, "Failed instances: {}", self.failed_instances.len())?;
        for failed in &self.failed_instances {
            writeln!(f, " > [{}] {}: {}", failed.index, failed.key, failed.message)?;
        }
        writeln!(f, "Skipped instances: {}", self.skipped_instances.len())?;
        for skipped in &self.skipped_instances {
            writeln!(f, " > [{}] {}: {}", skipped.index, skipped.key, skipped.reason)?;
        }
        writeln!(f, "Failed annotations: {}", self.failed_annotations.len())?;
        for failure in &self.failed_annotations {
            writeln!(f, " > {}", failure)?;
        }
        if let Some(failure) = &self.hierarchy_failure {
            writeln!(f, "Term hierarchy unavailable: {}", failure)?;
        }
        if self.hierarchy_requests > 0 {
            writeln!(f, "Term hierarchy requests: {}", self.hierarchy_requests)?;
        }
        write!(f, "Annotation requests: {}", self.annotation_requests)
    }
}

impl PipelineRun {
    pub fn attractor_count(&self) -> usize {
        self.evaluations.iter().map(|it| it.attractors().len()).sum()
    }

    /// Write the three report tables and a JSON summary into `directory`.
    /// Returns the paths of all written files.
    pub fn export(&self, directory: &Path, name: &str) -> Result<Vec<PathBuf>, EnrichmentError> {
        let mut written = self.report.write_csv_files(directory, name)?;
        let summary = RunSummary {
            model: self.model.name(),
            instances: self.instances.len(),
            evaluated_instances: self.evaluations.len(),
            attractors: self.attractor_count(),
            unmapped_frequency: self.results.unmapped_frequency(),
            always_unmapped: self.results.always_unmapped(),
            diagnostics: &self.diagnostics,
            visualization: &self.visualization,
        };
        let path = directory.join(format!("{}_summary.json", name));
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &summary)?;
        written.push(path);
        Ok(written)
    }
}
