use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};

use crate::analysis::AnalysisReport;
use crate::error::SinkError;
use crate::sink::{ReportSink, render};

/// Writes each report to `<dir>/<ticker>.json`, replacing any earlier file.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        let name: String = ticker
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportSink for DirectorySink {
    fn publish(&self, report: &AnalysisReport) -> Result<(), Report<SinkError>> {
        let write_error = || SinkError::Write {
            ticker: report.ticker.clone(),
        };

        std::fs::create_dir_all(&self.dir)
            .change_context_lazy(write_error)
            .attach_with(|| format!("output_dir: {}", self.dir.display()))?;

        let path = self.path_for(&report.ticker);
        let document = render(report)?;
        std::fs::write(&path, document)
            .change_context_lazy(write_error)
            .attach_with(|| format!("path: {}", path.display()))?;

        tracing::info!(ticker = %report.ticker, path = %path.display(), "report written");
        Ok(())
    }
}
