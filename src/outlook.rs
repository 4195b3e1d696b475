use serde::{Deserialize, Serialize};

use crate::config::OutlookConfig;
use crate::model::{ConfidenceLevel, ConfidenceResult};

/// Coarse label for the forecast as a whole, for display by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    HighRisk,
    Positive,
    Negative,
    Neutral,
    Moderate,
}

/// Rules are checked in order; the first match wins.
pub fn assess(
    expected_return_percent: f64,
    confidence: &ConfidenceResult,
    config: &OutlookConfig,
) -> Outlook {
    let ret = expected_return_percent;
    if confidence.level == ConfidenceLevel::Low
        || confidence.historical_volatility_percent > config.high_risk_volatility_percent
    {
        Outlook::HighRisk
    } else if ret > config.strong_return_percent {
        Outlook::Positive
    } else if ret < -config.strong_return_percent {
        Outlook::Negative
    } else if ret.abs() <= config.neutral_band_percent {
        Outlook::Neutral
    } else {
        Outlook::Moderate
    }
}
