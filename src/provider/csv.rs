use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::model::{PriceBar, PriceHistory};
use crate::provider::HistoryProvider;

/// One CSV row. Accepts both lowercase headers and the capitalized headers
/// common in spreadsheet exports; extra columns are ignored.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume")]
    volume: f64,
}

impl From<CsvRow> for PriceBar {
    fn from(row: CsvRow) -> Self {
        Self {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

/// Reads daily bars from one CSV file per ticker.
#[derive(Debug, Default, Clone)]
pub struct CsvFileProvider {
    files: HashMap<String, PathBuf>,
}

impl CsvFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, ticker: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(ticker.into(), path.into());
        self
    }
}

impl HistoryProvider for CsvFileProvider {
    fn fetch_history(
        &self,
        ticker: &str,
        lookback: Option<usize>,
    ) -> BoxFuture<'_, Result<PriceHistory, Report<ProviderError>>> {
        let ticker = ticker.to_string();
        Box::pin(async move {
            let Some(path) = self.files.get(&ticker) else {
                bail!(ProviderError::Read { ticker });
            };

            let bytes = tokio::fs::read(path)
                .await
                .change_context_lazy(|| ProviderError::Read {
                    ticker: ticker.clone(),
                })
                .attach_with(|| format!("path: {}", path.display()))?;

            let history = parse_history(&ticker, bytes.as_slice(), lookback)
                .attach_with(|| format!("path: {}", path.display()))?;

            tracing::debug!(
                ticker = %ticker,
                bars = history.len(),
                from = %history.first().date,
                to = %history.last().date,
                "price history loaded"
            );
            Ok(history)
        })
    }
}

/// Parse CSV bars (oldest first) into a validated history.
///
/// Every row is validated, including rows that fall outside `lookback`; a bad
/// row fails the whole read rather than being skipped.
pub fn parse_history<R: Read>(
    ticker: &str,
    reader: R,
    lookback: Option<usize>,
) -> Result<PriceHistory, Report<ProviderError>> {
    let mut csv = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    for (index, row) in csv.deserialize::<CsvRow>().enumerate() {
        let row = row
            .change_context_lazy(|| ProviderError::Parse {
                ticker: ticker.to_string(),
            })
            .attach_with(|| format!("data row {}", index + 1))?;
        bars.push(PriceBar::from(row));
    }

    if bars.is_empty() {
        bail!(ProviderError::Empty {
            ticker: ticker.to_string(),
        });
    }

    let history = PriceHistory::new(bars).change_context_lazy(|| ProviderError::Invalid {
        ticker: ticker.to_string(),
    })?;

    Ok(match lookback {
        Some(count) => history.tail(count),
        None => history,
    })
}
