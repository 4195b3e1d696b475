use chrono::NaiveDate;
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::model::PriceHistory;
use crate::stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecentTrend {
    Bullish,
    Bearish,
}

/// Descriptive statistics over the closes of a price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSummary {
    pub data_points: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub mean: f64,
    pub median: f64,
    pub std_deviation: f64,
    pub min: f64,
    pub max: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub annualized_volatility_percent: f64,
    pub recent_trend: RecentTrend,
}

pub fn summarize(history: &PriceHistory) -> Result<HistoricalSummary, Report<ForecastError>> {
    if history.len() < 2 {
        bail!(ForecastError::insufficient(
            "historical_summary",
            2,
            history.len()
        ));
    }

    let closes = history.closes();
    let first = history.first().close;
    let last = history.last_close();
    let (min, max) = closes
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| {
            (lo.min(c), hi.max(c))
        });

    Ok(HistoricalSummary {
        data_points: closes.len(),
        start_date: history.first().date,
        end_date: history.last().date,
        mean: stats::mean(&closes),
        median: stats::median(&closes),
        std_deviation: stats::sample_std_dev(&closes),
        min,
        max,
        price_change: last - first,
        price_change_percent: (last / first - 1.0) * 100.0,
        annualized_volatility_percent: stats::annualized_volatility_percent(&closes),
        recent_trend: if last > first {
            RecentTrend::Bullish
        } else {
            RecentTrend::Bearish
        },
    })
}
