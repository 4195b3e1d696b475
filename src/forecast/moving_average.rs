use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::config::MovingAverageConfig;
use crate::error::ForecastError;
use crate::indicator::ma::Sma;
use crate::model::{ForecastMethod, ForecastPoint, PriceHistory};
use crate::stats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageForecast {
    pub point: ForecastPoint,
    pub ma_short: f64,
    pub ma_long: f64,
    /// Relative drift per day implied by the gap between the two averages.
    pub daily_rate: f64,
    /// Sample standard deviation of the most recent daily returns.
    pub recent_volatility: f64,
    /// Whether the compounded move hit `max_move`.
    pub capped: bool,
}

/// Extrapolates the short/long moving-average spread.
///
/// The two averages are centred `(long - short) / 2` bars apart, so their
/// relative gap divided by that distance is read as a daily growth rate and
/// compounded over the horizon. The compounded factor is clamped to
/// `1 ± max_move`.
pub struct MovingAverageForecaster {
    short_window: usize,
    long_window: usize,
    max_move: f64,
    band_multiplier: f64,
    volatility_window: usize,
}

impl MovingAverageForecaster {
    pub fn new(config: &MovingAverageConfig) -> Self {
        Self {
            short_window: config.short_window,
            long_window: config.long_window,
            max_move: config.max_move,
            band_multiplier: config.band_multiplier,
            volatility_window: config.volatility_window,
        }
    }

    pub fn required_bars(&self) -> usize {
        self.long_window.max(3)
    }

    pub fn forecast(
        &self,
        history: &PriceHistory,
        horizon_days: u32,
    ) -> Result<MovingAverageForecast, Report<ForecastError>> {
        let method = ForecastMethod::MovingAverage;
        if self.short_window >= self.long_window {
            bail!(ForecastError::InvalidParameter {
                name: "moving_average.short_window must be < long_window".into(),
            });
        }
        let required = self.required_bars();
        if history.len() < required {
            bail!(ForecastError::insufficient(
                method.as_str(),
                required,
                history.len()
            ));
        }

        let closes = history.closes();
        let current = history.last_close();
        let ma_short = Sma::new(self.short_window)?.latest(&closes)?;
        let ma_long = Sma::new(self.long_window)?.latest(&closes)?;

        let lag = (self.long_window - self.short_window) as f64 / 2.0;
        let daily_rate = (ma_short / ma_long - 1.0) / lag;
        let raw_factor = (1.0 + daily_rate).max(0.0).powf(horizon_days as f64);
        let factor = raw_factor.clamp(1.0 - self.max_move, 1.0 + self.max_move);
        let capped = factor != raw_factor;
        let predicted = current * factor;

        let returns = stats::daily_returns(&closes);
        let recent = &returns[returns.len().saturating_sub(self.volatility_window)..];
        let recent_volatility = stats::sample_std_dev(recent);
        let half_width =
            self.band_multiplier * recent_volatility * (horizon_days as f64).sqrt() * predicted;

        let point = ForecastPoint::new(
            method,
            horizon_days,
            predicted,
            predicted - half_width,
            predicted + half_width,
        )?;

        if capped {
            tracing::debug!(
                method = %method,
                raw_factor,
                factor,
                "moving-average extrapolation capped"
            );
        }

        Ok(MovingAverageForecast {
            point,
            ma_short,
            ma_long,
            daily_rate,
            recent_volatility,
            capped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::{flat, history_from_closes, rising};

    fn forecaster() -> MovingAverageForecaster {
        MovingAverageForecaster::new(&MovingAverageConfig::default())
    }

    #[test]
    fn insufficient_history() {
        let err = forecaster().forecast(&rising(29), 10).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ForecastError::InsufficientHistory {
                required: 30,
                available: 29,
                ..
            }
        ));
    }

    #[test]
    fn rising_series_predicts_higher() {
        let history = rising(90);
        let result = forecaster().forecast(&history, 30).unwrap();
        assert!(result.ma_short > result.ma_long);
        assert!(result.daily_rate > 0.0);
        assert!(result.point.predicted_price > history.last_close());
        assert!(!result.capped);
    }

    #[test]
    fn flat_series_predicts_current_price() {
        let result = forecaster().forecast(&flat(40, 25.0), 30).unwrap();
        assert!((result.point.predicted_price - 25.0).abs() < 1e-9);
        assert_eq!(result.recent_volatility, 0.0);
        assert_eq!(result.point.lower_bound, result.point.upper_bound);
    }

    #[test]
    fn runaway_growth_is_capped() {
        // Exponential growth of 10% per day
        let closes: Vec<f64> = (0..40).map(|i| 10.0 * 1.1_f64.powi(i)).collect();
        let history = history_from_closes(&closes);
        let result = forecaster().forecast(&history, 120).unwrap();
        assert!(result.capped);
        assert!((result.point.predicted_price - history.last_close() * 1.5).abs() < 1e-6);
    }

    #[test]
    fn runaway_decline_is_capped() {
        let closes: Vec<f64> = (0..40).map(|i| 1000.0 * 0.9_f64.powi(i)).collect();
        let history = history_from_closes(&closes);
        let result = forecaster().forecast(&history, 120).unwrap();
        assert!(result.capped);
        assert!((result.point.predicted_price - history.last_close() * 0.5).abs() < 1e-6);
        assert!(result.point.lower_bound > 0.0);
    }
}
