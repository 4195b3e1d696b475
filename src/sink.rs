pub mod directory;
pub mod terminal;

use error_stack::{Report, ResultExt};

use crate::analysis::AnalysisReport;
use crate::error::SinkError;

/// Destination for finished analysis reports.
pub trait ReportSink: Send + Sync {
    fn publish(&self, report: &AnalysisReport) -> Result<(), Report<SinkError>>;
}

/// Pretty-printed JSON document for one report.
pub fn render(report: &AnalysisReport) -> Result<String, Report<SinkError>> {
    serde_json::to_string_pretty(report).change_context_lazy(|| SinkError::Serialize {
        ticker: report.ticker.clone(),
    })
}
