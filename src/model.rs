use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Smallest price any forecast may report. Simulated and extrapolated prices
/// are floored here so they never reach zero or go negative.
pub const MIN_PRICE: f64 = 1e-6;

/// One daily observation for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered price bars, oldest first.
///
/// Construction validates the ordering and value invariants, so every
/// `PriceHistory` handed to the engine is already known to be well formed.
/// Dates must strictly increase, but calendar gaps between them (weekends,
/// holidays, halted sessions) are accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn new(bars: Vec<PriceBar>) -> Result<Self, Report<ForecastError>> {
        if bars.is_empty() {
            bail!(ForecastError::InvalidInput {
                reason: "price history is empty".into(),
            });
        }

        for (index, bar) in bars.iter().enumerate() {
            validate_bar(index, bar)?;
        }

        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            bail!(ForecastError::InvalidInput {
                reason: format!(
                    "dates must be strictly increasing: {} is followed by {}",
                    pair[0].date, pair[1].date
                ),
            });
        }

        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first(&self) -> &PriceBar {
        &self.bars[0]
    }

    pub fn last(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn last_close(&self) -> f64 {
        self.last().close
    }

    /// Keep only the trailing `count` bars.
    pub fn tail(&self, count: usize) -> Self {
        let start = self.bars.len().saturating_sub(count.max(1));
        Self {
            bars: self.bars[start..].to_vec(),
        }
    }
}

fn validate_bar(index: usize, bar: &PriceBar) -> Result<(), Report<ForecastError>> {
    let prices = [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
    ];
    for (field, value) in prices {
        if !value.is_finite() || value <= 0.0 {
            bail!(ForecastError::InvalidInput {
                reason: format!("bar {index} ({}): {field} must be positive, got {value}", bar.date),
            });
        }
    }
    if !bar.volume.is_finite() || bar.volume < 0.0 {
        bail!(ForecastError::InvalidInput {
            reason: format!(
                "bar {index} ({}): volume must be non-negative, got {}",
                bar.date, bar.volume
            ),
        });
    }
    if bar.high < bar.low {
        bail!(ForecastError::InvalidInput {
            reason: format!(
                "bar {index} ({}): high {} is below low {}",
                bar.date, bar.high, bar.low
            ),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    LinearTrend,
    MovingAverage,
    MonteCarlo,
}

impl ForecastMethod {
    pub const ALL: [ForecastMethod; 3] = [Self::LinearTrend, Self::MovingAverage, Self::MonteCarlo];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinearTrend => "linear_trend",
            Self::MovingAverage => "moving_average",
            Self::MonteCarlo => "monte_carlo",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single method's price prediction `horizon_days` ahead.
///
/// Invariant: `MIN_PRICE <= lower_bound <= predicted_price <= upper_bound`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub predicted_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub horizon_days: u32,
    pub method: ForecastMethod,
}

impl ForecastPoint {
    /// Build a point, flooring prices at `MIN_PRICE` and widening the bounds
    /// so they always bracket the prediction.
    pub fn new(
        method: ForecastMethod,
        horizon_days: u32,
        predicted_price: f64,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Self, Report<ForecastError>> {
        for (name, value) in [
            ("predicted_price", predicted_price),
            ("lower_bound", lower_bound),
            ("upper_bound", upper_bound),
        ] {
            if !value.is_finite() {
                bail!(ForecastError::NumericalDegenerate {
                    method: method.to_string(),
                    detail: format!("{name} is {value}"),
                });
            }
        }

        let predicted_price = predicted_price.max(MIN_PRICE);
        Ok(Self {
            predicted_price,
            lower_bound: lower_bound.max(MIN_PRICE).min(predicted_price),
            upper_bound: upper_bound.max(predicted_price),
            horizon_days,
            method,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub rsi: f64,
    pub rsi_average_gain: f64,
    pub rsi_average_loss: f64,
    pub macd_line: f64,
    pub macd_signal_line: f64,
    pub macd_histogram: f64,
    pub macd_histogram_previous: f64,
    pub ma_short: f64,
    pub ma_long: f64,
    pub bollinger_upper: f64,
    pub bollinger_mid: f64,
    pub bollinger_lower: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub predicted_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub horizon_days: u32,
    pub current_price: f64,
    pub component_forecasts: BTreeMap<ForecastMethod, ForecastPoint>,
    pub expected_return_percent: f64,
}

impl EnsembleResult {
    pub fn component_prices(&self) -> Vec<f64> {
        self.component_forecasts
            .values()
            .map(|p| p.predicted_price)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            75.. => Self::High,
            40..=74 => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// How closely the three forecasting methods agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    High,
    Moderate,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub score: u8,
    pub level: ConfidenceLevel,
    pub dispersion_percent: f64,
    pub historical_volatility_percent: f64,
    pub agreement: Agreement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StrongBuy => "strong_buy",
            Self::Buy => "buy",
            Self::Hold => "hold",
            Self::Sell => "sell",
            Self::StrongSell => "strong_sell",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalFlag {
    Overbought,
    Oversold,
    MacdBullishCross,
    MacdBearishCross,
    MaBullish,
    MaBearish,
    StrongBullishMomentum,
    BullishMomentum,
    StrongBearishMomentum,
    BearishMomentum,
}

impl SignalFlag {
    /// +1 for bullish flags, -1 for bearish ones. Every flag carries equal weight.
    pub fn direction(self) -> i32 {
        match self {
            Self::Oversold
            | Self::MacdBullishCross
            | Self::MaBullish
            | Self::StrongBullishMomentum
            | Self::BullishMomentum => 1,
            Self::Overbought
            | Self::MacdBearishCross
            | Self::MaBearish
            | Self::StrongBearishMomentum
            | Self::BearishMomentum => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub net_score: i32,
    pub flags: BTreeSet<SignalFlag>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, NaiveDate};

    use super::{PriceBar, PriceHistory};

    pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: start + Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1_000.0,
            })
            .collect()
    }

    pub fn history_from_closes(closes: &[f64]) -> PriceHistory {
        PriceHistory::new(bars_from_closes(closes)).unwrap()
    }

    /// 100, 101, ... rising by one each day.
    pub fn rising(len: usize) -> PriceHistory {
        let closes: Vec<f64> = (0..len).map(|i| 100.0 + i as f64).collect();
        history_from_closes(&closes)
    }

    pub fn flat(len: usize, price: f64) -> PriceHistory {
        history_from_closes(&vec![price; len])
    }

    /// Deterministic zig-zag around an upward drift.
    pub fn noisy(len: usize) -> PriceHistory {
        let closes: Vec<f64> = (0..len)
            .map(|i| {
                let wiggle = if i % 2 == 0 { 1.5 } else { -1.5 };
                100.0 + 0.3 * i as f64 + wiggle + ((i * 7) % 5) as f64 * 0.4
            })
            .collect();
        history_from_closes(&closes)
    }
}
