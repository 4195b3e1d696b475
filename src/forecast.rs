//! The three independent price forecasters.
//!
//! Each forecaster is a pure function of the price history and horizon (the
//! Monte Carlo forecaster additionally takes the caller's random source) and
//! returns its [`ForecastPoint`](crate::model::ForecastPoint) together with
//! method-specific diagnostics.

pub mod monte_carlo;
pub mod moving_average;
pub mod trend;

use error_stack::{Report, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ForecastError;
use crate::model::{ForecastPoint, PriceHistory};

use monte_carlo::{MonteCarloForecast, MonteCarloForecaster};
use moving_average::{MovingAverageForecast, MovingAverageForecaster};
use trend::{TrendForecast, TrendForecaster};

/// Output of all three forecasters for one history and horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSet {
    pub linear_trend: TrendForecast,
    pub moving_average: MovingAverageForecast,
    pub monte_carlo: MonteCarloForecast,
}

impl ForecastSet {
    pub fn points(&self) -> [ForecastPoint; 3] {
        [
            self.linear_trend.point,
            self.moving_average.point,
            self.monte_carlo.point,
        ]
    }
}

/// Run every forecaster. Any single failure fails the whole set.
pub fn forecast_all<R: Rng + ?Sized>(
    history: &PriceHistory,
    horizon_days: u32,
    config: &EngineConfig,
    rng: &mut R,
) -> Result<ForecastSet, Report<ForecastError>> {
    if horizon_days == 0 {
        bail!(ForecastError::InvalidParameter {
            name: "horizon_days must be > 0".into(),
        });
    }

    let linear_trend = TrendForecaster::new(&config.trend).forecast(history, horizon_days)?;
    let moving_average =
        MovingAverageForecaster::new(&config.moving_average).forecast(history, horizon_days)?;
    let monte_carlo =
        MonteCarloForecaster::new(&config.monte_carlo).forecast(history, horizon_days, rng)?;

    Ok(ForecastSet {
        linear_trend,
        moving_average,
        monte_carlo,
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::model::ForecastMethod;
    use crate::model::test_support::{history_from_closes, rising};

    #[test]
    fn points_are_tagged_by_method() {
        let mut rng = StdRng::seed_from_u64(1);
        let set = forecast_all(&rising(60), 10, &EngineConfig::default(), &mut rng).unwrap();
        let methods: Vec<ForecastMethod> = set.points().iter().map(|p| p.method).collect();
        assert_eq!(methods, ForecastMethod::ALL.to_vec());
        assert!(set.points().iter().all(|p| p.horizon_days == 10));
    }

    #[test]
    fn zero_horizon_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(forecast_all(&rising(60), 0, &EngineConfig::default(), &mut rng).is_err());
    }

    #[test]
    fn one_failing_method_fails_the_set() {
        // 20 bars satisfy the trend and Monte Carlo minimums but not the
        // 30-bar long moving average.
        let closes: Vec<f64> = (0..20).map(|i| 50.0 + i as f64).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let err = forecast_all(
            &history_from_closes(&closes),
            5,
            &EngineConfig::default(),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(
            err.current_context(),
            ForecastError::InsufficientHistory { method, .. } if method == "moving_average"
        ));
    }
}
