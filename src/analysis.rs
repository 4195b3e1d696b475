//! End-to-end analysis of one instrument's price history.

use chrono::NaiveDate;
use error_stack::{Report, ResultExt, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::confidence::ConfidenceScorer;
use crate::ensemble::EnsembleCombiner;
use crate::error::ForecastError;
use crate::forecast::{self, ForecastSet};
use crate::indicator;
use crate::model::{ConfidenceResult, EnsembleResult, PriceHistory, Signal, TechnicalSnapshot};
use crate::outlook::{self, Outlook};
use crate::signal::SignalGenerator;
use crate::stats;
use crate::summary::{self, HistoricalSummary};

/// Parameters for a single analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Used only to label the output.
    pub ticker: String,
    pub horizon_days: u32,
    pub config: EngineConfig,
}

impl AnalysisRequest {
    pub fn new(ticker: impl Into<String>) -> Self {
        let config = EngineConfig::default();
        Self {
            ticker: ticker.into(),
            horizon_days: config.horizon_days,
            config,
        }
    }

    pub fn with_horizon(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    /// Replace the engine configuration. The horizon is left as it is.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}

/// The three forecasts with their ensemble and its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub forecasts: ForecastSet,
    pub ensemble: EnsembleResult,
    pub confidence: ConfidenceResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub ticker: String,
    pub as_of: NaiveDate,
    pub current_price: f64,
    pub horizon_days: u32,
    pub summary: HistoricalSummary,
    pub technical: TechnicalSnapshot,
    pub forecasts: ForecastSet,
    pub ensemble: EnsembleResult,
    pub confidence: ConfidenceResult,
    pub signal: Signal,
    pub outlook: Outlook,
}

/// Run the forecasters, combine them and score the result.
pub fn run_forecast<R: Rng + ?Sized>(
    history: &PriceHistory,
    horizon_days: u32,
    config: &EngineConfig,
    rng: &mut R,
) -> Result<ForecastBundle, Report<ForecastError>> {
    let forecasts = forecast::forecast_all(history, horizon_days, config, rng)?;
    let ensemble =
        EnsembleCombiner::new(&config.ensemble)?.combine(&forecasts.points(), history.last_close())?;
    let volatility = stats::annualized_volatility_percent(&history.closes());
    let confidence = ConfidenceScorer::new(&config.confidence).score(&ensemble, volatility);

    Ok(ForecastBundle {
        forecasts,
        ensemble,
        confidence,
    })
}

/// Produce the full report for one instrument.
///
/// Pure apart from `rng`, which only the Monte Carlo forecaster draws from.
pub fn analyze<R: Rng + ?Sized>(
    request: &AnalysisRequest,
    history: &PriceHistory,
    rng: &mut R,
) -> Result<AnalysisReport, Report<ForecastError>> {
    if request.ticker.trim().is_empty() {
        bail!(ForecastError::InvalidInput {
            reason: "ticker must not be empty".into(),
        });
    }
    let config = &request.config;
    config
        .validate()
        .attach_with(|| format!("ticker: {}", request.ticker))?;

    let technical = indicator::snapshot(history, &config.indicators)
        .attach_with(|| format!("ticker: {}", request.ticker))?;
    let ForecastBundle {
        forecasts,
        ensemble,
        confidence,
    } = run_forecast(history, request.horizon_days, config, rng)
        .attach_with(|| format!("ticker: {}", request.ticker))?;
    let summary = summary::summarize(history)?;
    let signal = SignalGenerator::new(&config.signal).generate(&technical, &ensemble);
    let outlook = outlook::assess(ensemble.expected_return_percent, &confidence, &config.outlook);

    tracing::info!(
        ticker = %request.ticker,
        horizon_days = request.horizon_days,
        bars = history.len(),
        predicted_price = ensemble.predicted_price,
        expected_return_percent = ensemble.expected_return_percent,
        confidence = confidence.score,
        signal = %signal.kind,
        "analysis complete"
    );

    Ok(AnalysisReport {
        ticker: request.ticker.clone(),
        as_of: history.last().date,
        current_price: history.last_close(),
        horizon_days: request.horizon_days,
        summary,
        technical,
        forecasts,
        ensemble,
        confidence,
        signal,
        outlook,
    })
}
