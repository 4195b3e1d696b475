//! Fixed set of named operations exposed to an orchestrating caller.
//!
//! Each entry declares its inputs and output so a caller can discover what is
//! available without reflection, then dispatch by name through [`invoke`].

use error_stack::{Report, ResultExt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use serde_json::Value;

use crate::analysis::{self, AnalysisRequest};
use crate::config::EngineConfig;
use crate::error::ForecastError;
use crate::indicator;
use crate::model::PriceHistory;
use crate::summary;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
    pub description: &'static str,
}

type Handler = fn(&OperationInput) -> Result<Value, Report<ForecastError>>;

#[derive(Clone, Copy, Serialize)]
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub inputs: &'static [ParamSpec],
    /// Name of the output document type.
    pub output: &'static str,
    #[serde(skip)]
    handler: Handler,
}

impl std::fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// Arguments shared by every operation. Operations ignore what they don't use.
#[derive(Debug, Clone)]
pub struct OperationInput {
    pub ticker: String,
    pub history: PriceHistory,
    /// Falls back to `config.horizon_days`.
    pub horizon_days: Option<u32>,
    pub config: EngineConfig,
    /// Fixed seed for the Monte Carlo forecaster; fresh entropy when absent.
    pub seed: Option<u64>,
}

impl OperationInput {
    pub fn new(ticker: impl Into<String>, history: PriceHistory) -> Self {
        Self {
            ticker: ticker.into(),
            history,
            horizon_days: None,
            config: EngineConfig::default(),
            seed: None,
        }
    }

    fn horizon(&self) -> u32 {
        self.horizon_days.unwrap_or(self.config.horizon_days)
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

const TICKER: ParamSpec = ParamSpec {
    name: "ticker",
    kind: "string",
    required: true,
    description: "instrument identifier, used only to label the output",
};
const HISTORY: ParamSpec = ParamSpec {
    name: "history",
    kind: "price_history",
    required: true,
    description: "daily price bars, oldest first, strictly increasing dates",
};
const HORIZON: ParamSpec = ParamSpec {
    name: "horizon_days",
    kind: "integer",
    required: false,
    description: "forecast horizon in days (default 30)",
};
const SEED: ParamSpec = ParamSpec {
    name: "seed",
    kind: "integer",
    required: false,
    description: "seed for the Monte Carlo simulation",
};

pub static OPERATIONS: &[OperationSpec] = &[
    OperationSpec {
        name: "analyze_history",
        description: "full analysis: indicators, forecasts, ensemble, confidence, signal and outlook",
        inputs: &[TICKER, HISTORY, HORIZON, SEED],
        output: "analysis_report",
        handler: run_analyze_history,
    },
    OperationSpec {
        name: "technical_snapshot",
        description: "latest RSI, MACD, moving averages and Bollinger Bands",
        inputs: &[TICKER, HISTORY],
        output: "technical_snapshot",
        handler: run_technical_snapshot,
    },
    OperationSpec {
        name: "forecast",
        description: "linear trend, moving average and Monte Carlo forecasts with their ensemble and confidence",
        inputs: &[TICKER, HISTORY, HORIZON, SEED],
        output: "forecast_bundle",
        handler: run_forecast,
    },
    OperationSpec {
        name: "historical_summary",
        description: "descriptive statistics of the closing prices",
        inputs: &[TICKER, HISTORY],
        output: "historical_summary",
        handler: run_historical_summary,
    },
];

pub fn find(name: &str) -> Option<&'static OperationSpec> {
    OPERATIONS.iter().find(|op| op.name == name)
}

/// Run the operation registered under `name`.
pub fn invoke(name: &str, input: &OperationInput) -> Result<Value, Report<ForecastError>> {
    let Some(spec) = find(name) else {
        return Err(Report::new(ForecastError::UnknownOperation {
            name: name.to_string(),
        }));
    };
    tracing::debug!(operation = spec.name, ticker = %input.ticker, "invoking operation");
    (spec.handler)(input).attach_with(|| format!("operation: {}", spec.name))
}

fn to_value<T: Serialize>(operation: &str, output: &T) -> Result<Value, Report<ForecastError>> {
    serde_json::to_value(output).change_context(ForecastError::NumericalDegenerate {
        method: operation.to_string(),
        detail: "output is not representable as JSON".into(),
    })
}

fn run_analyze_history(input: &OperationInput) -> Result<Value, Report<ForecastError>> {
    let request = AnalysisRequest::new(input.ticker.clone())
        .with_config(input.config.clone())
        .with_horizon(input.horizon());
    let report = analysis::analyze(&request, &input.history, &mut input.rng())?;
    to_value("analyze_history", &report)
}

fn run_technical_snapshot(input: &OperationInput) -> Result<Value, Report<ForecastError>> {
    let snapshot = indicator::snapshot(&input.history, &input.config.indicators)?;
    to_value("technical_snapshot", &snapshot)
}

fn run_forecast(input: &OperationInput) -> Result<Value, Report<ForecastError>> {
    input.config.validate()?;
    let bundle = analysis::run_forecast(
        &input.history,
        input.horizon(),
        &input.config,
        &mut input.rng(),
    )?;
    to_value("forecast", &bundle)
}

fn run_historical_summary(input: &OperationInput) -> Result<Value, Report<ForecastError>> {
    let summary = summary::summarize(&input.history)?;
    to_value("historical_summary", &summary)
}
