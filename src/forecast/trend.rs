use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::config::TrendConfig;
use crate::error::ForecastError;
use crate::model::{ForecastMethod, ForecastPoint, PriceHistory};

/// Relative daily slope below which the trend counts as flat.
const NEUTRAL_SLOPE: f64 = 0.001;
/// Relative daily slope below which the trend counts as moderate.
const MODERATE_SLOPE: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendClassification {
    Neutral,
    ModerateBullish,
    ModerateBearish,
    StrongBullish,
    StrongBearish,
}

impl TrendClassification {
    /// Classify by slope relative to the current price.
    pub fn from_slope(slope: f64, current_price: f64) -> Self {
        let strength = slope.abs() / current_price;
        if strength < NEUTRAL_SLOPE {
            return Self::Neutral;
        }
        match (strength < MODERATE_SLOPE, slope > 0.0) {
            (true, true) => Self::ModerateBullish,
            (true, false) => Self::ModerateBearish,
            (false, true) => Self::StrongBullish,
            (false, false) => Self::StrongBearish,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendForecast {
    pub point: ForecastPoint,
    /// Fitted price change per bar.
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub residual_std_error: f64,
    pub classification: TrendClassification,
}

/// Ordinary least squares of close against bar index, extrapolated forward.
pub struct TrendForecaster {
    band_multiplier: f64,
}

impl TrendForecaster {
    pub fn new(config: &TrendConfig) -> Self {
        Self {
            band_multiplier: config.band_multiplier,
        }
    }

    pub fn forecast(
        &self,
        history: &PriceHistory,
        horizon_days: u32,
    ) -> Result<TrendForecast, Report<ForecastError>> {
        let method = ForecastMethod::LinearTrend;
        if history.len() < 2 {
            bail!(ForecastError::insufficient(method.as_str(), 2, history.len()));
        }

        let closes = history.closes();
        let fit = fit_line(&closes);

        let target_x = (closes.len() - 1) as f64 + horizon_days as f64;
        let predicted = fit.intercept + fit.slope * target_x;
        let half_width =
            self.band_multiplier * fit.residual_std_error * (horizon_days as f64).sqrt();

        let point = ForecastPoint::new(
            method,
            horizon_days,
            predicted,
            predicted - half_width,
            predicted + half_width,
        )?;

        tracing::debug!(
            method = %method,
            slope = fit.slope,
            r_squared = fit.r_squared,
            predicted = point.predicted_price,
            "trend forecast computed"
        );

        Ok(TrendForecast {
            point,
            slope: fit.slope,
            intercept: fit.intercept,
            r_squared: fit.r_squared,
            residual_std_error: fit.residual_std_error,
            classification: TrendClassification::from_slope(fit.slope, history.last_close()),
        })
    }
}

struct LineFit {
    slope: f64,
    intercept: f64,
    r_squared: f64,
    residual_std_error: f64,
}

/// Requires at least two points. A two-point fit is exact, so its residual
/// standard error is reported as zero.
fn fit_line(ys: &[f64]) -> LineFit {
    let n = ys.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = ys.iter().sum::<f64>() / n;

    let (sxx, sxy) = ys
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxx, sxy), (i, &y)| {
            let dx = i as f64 - x_mean;
            (sxx + dx * dx, sxy + dx * (y - y_mean))
        });

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let (sse, sst) = ys
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sse, sst), (i, &y)| {
            let residual = y - (intercept + slope * i as f64);
            (sse + residual * residual, sst + (y - y_mean).powi(2))
        });

    let residual_std_error = if ys.len() > 2 {
        (sse / (n - 2.0)).sqrt()
    } else {
        0.0
    };
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 1.0 };

    LineFit {
        slope,
        intercept,
        r_squared,
        residual_std_error,
    }
}
