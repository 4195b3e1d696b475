use std::io::Write;

use error_stack::{Report, ResultExt};

use crate::analysis::AnalysisReport;
use crate::error::SinkError;
use crate::sink::{ReportSink, render};

/// Logs a one-line summary and writes the JSON report to stdout.
pub struct TerminalSink;

impl ReportSink for TerminalSink {
    fn publish(&self, report: &AnalysisReport) -> Result<(), Report<SinkError>> {
        tracing::info!(
            ticker = %report.ticker,
            as_of = %report.as_of,
            current_price = report.current_price,
            predicted_price = report.ensemble.predicted_price,
            confidence = report.confidence.score,
            signal = %report.signal.kind,
            "report ready"
        );

        let document = render(report)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{document}").change_context_lazy(|| SinkError::Write {
            ticker: report.ticker.clone(),
        })
    }
}
