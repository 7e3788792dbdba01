use crate::enrichment::Granularity;
use crate::report::{Report, ReportTable};
use crate::EnrichmentError;
use std::io::Write;
use std::path::{Path, PathBuf};

impl Granularity {
    /// Suffix of the exported file name of this granularity.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Granularity::AllInstances => "OnAllInstances",
            Granularity::PerInstance => "OnInstance",
            Granularity::PerAttractor => "OnAttractors",
        }
    }
}

impl ReportTable {
    /// Write the table as CSV: `term_id`, `term_label` and one column per scope.
    /// Absent terms are written as empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), EnrichmentError> {
        let mut writer = csv::Writer::from_writer(writer);
        let mut header = vec!["term_id".to_string(), "term_label".to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;
        for row in &self.rows {
            let mut record = vec![row.term.id().to_string(), row.term.label().to_string()];
            record.extend(row.cells.iter().map(|it| it.clone().unwrap_or_default()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Report {
    /// Write all three tables into `directory` as `<name>_<suffix>.csv`.
    pub fn write_csv_files(
        &self,
        directory: &Path,
        name: &str,
    ) -> Result<Vec<PathBuf>, EnrichmentError> {
        std::fs::create_dir_all(directory)?;
        let mut written = Vec::new();
        for granularity in [
            Granularity::AllInstances,
            Granularity::PerInstance,
            Granularity::PerAttractor,
        ] {
            let path = directory.join(format!("{}_{}.csv", name, granularity.file_suffix()));
            let file = std::fs::File::create(&path)?;
            self.table(granularity).write_csv(std::io::BufWriter::new(file))?;
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use crate::report::{CellPolicy, ReportBuilder};
    use crate::test_utils::scenario_results;
    use pretty_assertions::assert_eq;

    #[test]
    fn csv_table() {
        let report = ReportBuilder::new(CellPolicy::Presence).build(&scenario_results());
        let mut buffer = Vec::new();
        report.per_instance().write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            "term_id,term_label,[0],[1]\nT1,term one,x,x\nT2,term two,,x\n",
            text
        );
    }

    #[test]
    fn csv_files() {
        let directory = tempfile::tempdir().unwrap();
        let report = ReportBuilder::new(CellPolicy::Nodes).build(&scenario_results());
        let written = report.write_csv_files(directory.path(), "scenario").unwrap();
        assert_eq!(3, written.len());
        assert!(written[0].ends_with("scenario_OnAllInstances.csv"));
        assert!(written[2].ends_with("scenario_OnAttractors.csv"));
        let attractors = std::fs::read_to_string(&written[2]).unwrap();
        assert!(attractors.starts_with("term_id,term_label,[clr:0][att:0],[clr:1][att:0]\n"));
        assert!(attractors.contains("T1,term one,\"node1,node3\",node1\n"));
    }
}
