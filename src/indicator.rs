pub mod bollinger;
pub mod ma;
pub mod macd;
pub mod rsi;

use error_stack::{Report, bail};

use crate::config::IndicatorConfig;
use crate::error::ForecastError;
use crate::model::{PriceBar, PriceHistory, TechnicalSnapshot};

use bollinger::BollingerBands;
use ma::Sma;
use macd::Macd;
use rsi::Rsi;

/// A technical analysis indicator that operates on a slice of price bars.
///
/// Bars must be in ascending chronological order (oldest first).
pub trait Indicator: Send + Sync {
    /// Unique name of this indicator (e.g., "rsi", "sma").
    fn name(&self) -> &str;

    /// Minimum number of bars required to produce at least one output value.
    fn required_bars(&self) -> usize;

    /// Calculate indicator values from bars.
    ///
    /// Returns one value per output point. The number of values may be less
    /// than the number of input bars depending on the indicator's lookback.
    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, Report<ForecastError>>;
}

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Compute the latest RSI, MACD, moving averages and Bollinger Bands.
pub fn snapshot(
    history: &PriceHistory,
    config: &IndicatorConfig,
) -> Result<TechnicalSnapshot, Report<ForecastError>> {
    let indicators = build(config)?;
    let required = indicators.required();
    if history.len() < required {
        bail!(ForecastError::insufficient(
            "technical_snapshot",
            required,
            history.len()
        ));
    }

    let bars = history.bars();
    let prices = close_prices(bars);

    let rsi = last(indicators.rsi.readings(&prices)?, indicators.rsi.name())?;
    let macd_values = indicators.macd.calculate_prices(&prices)?;
    let (macd_line, macd_signal_line, macd_histogram) = last(macd_values.clone(), "macd")?;
    let macd_histogram_previous = macd_values
        .len()
        .checked_sub(2)
        .map(|i| macd_values[i].2)
        .unwrap_or(macd_histogram);
    let ma_short = last(indicators.ma_short.calculate(bars)?, "ma_short")?;
    let ma_long = last(indicators.ma_long.calculate(bars)?, "ma_long")?;
    let (bollinger_upper, bollinger_mid, bollinger_lower) =
        last(indicators.bollinger.calculate_bands(&prices)?, "bollinger")?;

    let snapshot = TechnicalSnapshot {
        rsi: rsi.value.clamp(0.0, 100.0),
        rsi_average_gain: rsi.average_gain,
        rsi_average_loss: rsi.average_loss,
        macd_line,
        macd_signal_line,
        macd_histogram,
        macd_histogram_previous,
        ma_short,
        ma_long,
        bollinger_upper,
        bollinger_mid,
        bollinger_lower,
    };

    tracing::debug!(
        rsi = snapshot.rsi,
        macd_histogram = snapshot.macd_histogram,
        ma_short = snapshot.ma_short,
        ma_long = snapshot.ma_long,
        "technical snapshot computed"
    );

    Ok(snapshot)
}

struct SnapshotIndicators {
    rsi: Rsi,
    macd: Macd,
    ma_short: Sma,
    ma_long: Sma,
    bollinger: BollingerBands,
}

impl SnapshotIndicators {
    fn required(&self) -> usize {
        let all: [&dyn Indicator; 5] = [
            &self.rsi,
            &self.macd,
            &self.ma_short,
            &self.ma_long,
            &self.bollinger,
        ];
        all.iter().map(|i| i.required_bars()).max().unwrap_or(1)
    }
}

fn build(config: &IndicatorConfig) -> Result<SnapshotIndicators, Report<ForecastError>> {
    Ok(SnapshotIndicators {
        rsi: Rsi::new(config.rsi_period)?,
        macd: Macd::new(config.macd_fast, config.macd_slow, config.macd_signal)?,
        ma_short: Sma::new(config.ma_short)?,
        ma_long: Sma::new(config.ma_long)?,
        bollinger: BollingerBands::new(config.bollinger_period, config.bollinger_stddev)?,
    })
}

fn last<T>(values: Vec<T>, name: &str) -> Result<T, Report<ForecastError>> {
    match values.into_iter().last() {
        Some(v) => Ok(v),
        None => bail!(ForecastError::NumericalDegenerate {
            method: name.to_string(),
            detail: "indicator produced no values".into(),
        }),
    }
}
