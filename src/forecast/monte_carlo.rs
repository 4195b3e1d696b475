use error_stack::{Report, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MonteCarloConfig;
use crate::error::ForecastError;
use crate::model::{ForecastMethod, ForecastPoint, MIN_PRICE, PriceHistory};
use crate::stats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloForecast {
    /// Median terminal price is the point estimate; percentiles are the bounds.
    pub point: ForecastPoint,
    pub drift: f64,
    pub volatility: f64,
    pub simulations: usize,
    pub mean_price: f64,
    pub std_dev: f64,
}

/// Geometric random walk driven by the historical daily return distribution.
pub struct MonteCarloForecaster {
    simulations: usize,
    lower_percentile: f64,
    upper_percentile: f64,
}

impl MonteCarloForecaster {
    /// At least two returns are needed to estimate volatility.
    pub const REQUIRED_BARS: usize = 3;

    pub fn new(config: &MonteCarloConfig) -> Self {
        Self {
            simulations: config.simulations,
            lower_percentile: config.lower_percentile,
            upper_percentile: config.upper_percentile,
        }
    }

    /// Simulate terminal prices `horizon_days` ahead.
    ///
    /// The caller owns `rng`; a seeded generator makes the result reproducible.
    pub fn forecast<R: Rng + ?Sized>(
        &self,
        history: &PriceHistory,
        horizon_days: u32,
        rng: &mut R,
    ) -> Result<MonteCarloForecast, Report<ForecastError>> {
        let method = ForecastMethod::MonteCarlo;
        if self.simulations == 0 {
            bail!(ForecastError::InvalidParameter {
                name: "monte_carlo.simulations must be > 0".into(),
            });
        }
        if history.len() < Self::REQUIRED_BARS {
            bail!(ForecastError::insufficient(
                method.as_str(),
                Self::REQUIRED_BARS,
                history.len()
            ));
        }

        let returns = stats::daily_returns(&history.closes());
        let drift = stats::mean(&returns);
        // Zero volatility is a valid input: every path then follows the drift.
        let volatility = stats::sample_std_dev(&returns);
        let step_drift = drift - 0.5 * volatility * volatility;
        let start = history.last_close();

        let mut terminal: Vec<f64> = (0..self.simulations)
            .map(|_| {
                let mut price = start;
                for _ in 0..horizon_days {
                    let z = standard_normal(rng);
                    price = (price * (step_drift + volatility * z).exp()).max(MIN_PRICE);
                }
                price
            })
            .collect();

        if let Some(bad) = terminal.iter().find(|p| !p.is_finite()) {
            bail!(ForecastError::NumericalDegenerate {
                method: method.to_string(),
                detail: format!("simulated terminal price is {bad}"),
            });
        }

        terminal.sort_by(|a, b| a.total_cmp(b));
        let median = stats::median(&terminal);
        let lower = stats::percentile_sorted(&terminal, self.lower_percentile);
        let upper = stats::percentile_sorted(&terminal, self.upper_percentile);
        let mean_price = stats::mean(&terminal);
        let std_dev = stats::sample_std_dev(&terminal);

        let point = ForecastPoint::new(method, horizon_days, median, lower, upper)?;

        tracing::debug!(
            method = %method,
            simulations = self.simulations,
            drift,
            volatility,
            median,
            "monte carlo simulation complete"
        );

        Ok(MonteCarloForecast {
            point,
            drift,
            volatility,
            simulations: self.simulations,
            mean_price,
            std_dev,
        })
    }
}

/// Box-Muller transform over two uniform draws.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // gen() is in [0, 1); flip it so ln never sees zero.
    let u1: f64 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::model::test_support::{flat, history_from_closes, noisy, rising};

    fn forecaster() -> MonteCarloForecaster {
        MonteCarloForecaster::new(&MonteCarloConfig::default())
    }

    #[test]
    fn two_bars_are_insufficient() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = forecaster()
            .forecast(&history_from_closes(&[10.0, 11.0]), 5, &mut rng)
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            ForecastError::InsufficientHistory {
                required: 3,
                available: 2,
                ..
            }
        ));
    }

    #[test]
    fn same_seed_same_result() {
        let history = noisy(100);
        let a = forecaster()
            .forecast(&history, 30, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = forecaster()
            .forecast(&history, 30, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let history = noisy(100);
        let a = forecaster()
            .forecast(&history, 30, &mut StdRng::seed_from_u64(1))
            .unwrap();
        let b = forecaster()
            .forecast(&history, 30, &mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_ne!(a.mean_price, b.mean_price);
    }

    #[test]
    fn flat_series_collapses_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        let result = forecaster().forecast(&flat(90, 100.0), 30, &mut rng).unwrap();
        assert_eq!(result.volatility, 0.0);
        assert!((result.point.predicted_price - 100.0).abs() < 1e-9);
        assert!((result.point.lower_bound - 100.0).abs() < 1e-9);
        assert!((result.point.upper_bound - 100.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_bracket_prediction() {
        let mut rng = StdRng::seed_from_u64(3);
        let result = forecaster().forecast(&noisy(120), 20, &mut rng).unwrap();
        let p = result.point;
        assert!(p.lower_bound < p.predicted_price);
        assert!(p.predicted_price < p.upper_bound);
        assert_eq!(result.simulations, 1000);
    }

    #[test]
    fn rising_series_drifts_up() {
        let history = rising(90);
        let mut rng = StdRng::seed_from_u64(5);
        let result = forecaster().forecast(&history, 30, &mut rng).unwrap();
        assert!(result.drift > 0.0);
        assert!(result.point.predicted_price > history.last_close());
    }

    #[test]
    fn crash_paths_stay_positive() {
        // Alternating +/-60% days give an extreme volatility estimate.
        let closes: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 100.0 } else { 40.0 })
            .collect();
        let mut rng = StdRng::seed_from_u64(11);
        let result = forecaster()
            .forecast(&history_from_closes(&closes), 250, &mut rng)
            .unwrap();
        assert!(result.point.lower_bound >= MIN_PRICE);
        assert!(result.point.predicted_price >= MIN_PRICE);
    }

    #[test]
    fn standard_normal_moments() {
        let mut rng = StdRng::seed_from_u64(42);
        let samples: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        assert!(stats::mean(&samples).abs() < 0.05);
        assert!((stats::sample_std_dev(&samples) - 1.0).abs() < 0.05);
    }
}
