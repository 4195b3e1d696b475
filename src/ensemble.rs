use std::collections::BTreeMap;

use error_stack::{Report, bail};

use crate::config::EnsembleConfig;
use crate::error::ForecastError;
use crate::model::{EnsembleResult, ForecastMethod, ForecastPoint};

/// Weighted combination of the per-method forecasts.
///
/// Bounds are the weighted means of the component bounds rather than their
/// union, so agreement between methods narrows the band.
#[derive(Debug, Clone)]
pub struct EnsembleCombiner {
    weights: BTreeMap<ForecastMethod, f64>,
}

impl EnsembleCombiner {
    pub fn new(config: &EnsembleConfig) -> Result<Self, Report<ForecastError>> {
        let raw = [
            (ForecastMethod::LinearTrend, config.linear_trend),
            (ForecastMethod::MovingAverage, config.moving_average),
            (ForecastMethod::MonteCarlo, config.monte_carlo),
        ];

        if let Some((method, _)) = raw.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
            bail!(ForecastError::InvalidParameter {
                name: format!("ensemble.{method} weight must be a non-negative number"),
            });
        }
        let total: f64 = raw.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            bail!(ForecastError::InvalidParameter {
                name: "ensemble weights must have a positive sum".into(),
            });
        }

        Ok(Self {
            weights: raw.into_iter().map(|(m, w)| (m, w / total)).collect(),
        })
    }

    /// Normalized weight of `method`; the three weights sum to one.
    pub fn weight(&self, method: ForecastMethod) -> f64 {
        self.weights.get(&method).copied().unwrap_or(0.0)
    }

    /// Combine exactly one forecast per method into an ensemble.
    ///
    /// A missing or duplicated method fails the whole combination: a partial
    /// ensemble would silently shift the weights.
    pub fn combine(
        &self,
        forecasts: &[ForecastPoint],
        current_price: f64,
    ) -> Result<EnsembleResult, Report<ForecastError>> {
        if !current_price.is_finite() || current_price <= 0.0 {
            bail!(ForecastError::InvalidInput {
                reason: format!("current price must be positive, got {current_price}"),
            });
        }

        let mut components = BTreeMap::new();
        for point in forecasts {
            if components.insert(point.method, *point).is_some() {
                bail!(ForecastError::InvalidInput {
                    reason: format!("duplicate {} forecast", point.method),
                });
            }
        }
        if let Some(missing) = ForecastMethod::ALL
            .iter()
            .find(|m| !components.contains_key(m))
        {
            bail!(ForecastError::InvalidInput {
                reason: format!("missing {missing} forecast"),
            });
        }

        let horizon_days = forecasts[0].horizon_days;
        if forecasts.iter().any(|p| p.horizon_days != horizon_days) {
            bail!(ForecastError::InvalidInput {
                reason: "component forecasts disagree on horizon".into(),
            });
        }

        let predicted_price = self.blend(&components, |p| p.predicted_price);
        let lower_bound = self
            .blend(&components, |p| p.lower_bound)
            .min(predicted_price);
        let upper_bound = self
            .blend(&components, |p| p.upper_bound)
            .max(predicted_price);
        let expected_return_percent = (predicted_price / current_price - 1.0) * 100.0;

        tracing::debug!(
            predicted_price,
            lower_bound,
            upper_bound,
            expected_return_percent,
            "ensemble combined"
        );

        Ok(EnsembleResult {
            predicted_price,
            lower_bound,
            upper_bound,
            horizon_days,
            current_price,
            component_forecasts: components,
            expected_return_percent,
        })
    }

    /// Weighted mean of one field, clamped to the component range since
    /// rounding can push a weighted mean one ulp outside its inputs.
    fn blend(
        &self,
        components: &BTreeMap<ForecastMethod, ForecastPoint>,
        field: impl Fn(&ForecastPoint) -> f64,
    ) -> f64 {
        let (min, max) = components
            .values()
            .map(&field)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let mean: f64 = components
            .iter()
            .map(|(method, point)| self.weight(*method) * field(point))
            .sum();
        mean.clamp(min, max)
    }
}
