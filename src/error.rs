use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum ProviderError {
    #[display("failed to read price history for {ticker}")]
    Read { ticker: String },
    #[display("failed to parse price history for {ticker}")]
    Parse { ticker: String },
    #[display("no price history available for {ticker}")]
    Empty { ticker: String },
    #[display("price history for {ticker} is invalid")]
    Invalid { ticker: String },
}

#[derive(Debug, Display, Error)]
pub enum SinkError {
    #[display("failed to serialize report for {ticker}")]
    Serialize { ticker: String },
    #[display("failed to write report for {ticker}")]
    Write { ticker: String },
}

/// Failures raised by the forecasting and technical-analysis engine.
///
/// Every variant names the method (or precondition) that failed so the caller
/// can log it without re-deriving context.
#[derive(Debug, Display, Error, PartialEq)]
pub enum ForecastError {
    #[display("{method}: insufficient history, need {required} bars, got {available}")]
    InsufficientHistory {
        method: String,
        required: usize,
        available: usize,
    },
    #[display("invalid input: {reason}")]
    InvalidInput { reason: String },
    #[display("{method}: numerically degenerate result ({detail})")]
    NumericalDegenerate { method: String, detail: String },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
    #[display("unknown operation: {name}")]
    UnknownOperation { name: String },
}

impl ForecastError {
    pub fn insufficient(method: impl Into<String>, required: usize, available: usize) -> Self {
        Self::InsufficientHistory {
            method: method.into(),
            required,
            available,
        }
    }
}
