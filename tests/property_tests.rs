//! Property tests for engine invariants.
//!
//! Uses proptest to verify, over random price walks:
//! 1. RSI and confidence score stay within [0, 100]
//! 2. Every forecast and the ensemble satisfy lower <= predicted <= upper
//! 3. The ensemble prediction lies between the component predictions
//! 4. More disagreement between methods never raises the confidence score
//! 5. A fixed seed reproduces the Monte Carlo result exactly

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use stock_forecaster::analysis::{AnalysisRequest, analyze};
use stock_forecaster::confidence::ConfidenceScorer;
use stock_forecaster::config::{ConfidenceConfig, EngineConfig, EnsembleConfig, MonteCarloConfig};
use stock_forecaster::ensemble::EnsembleCombiner;
use stock_forecaster::forecast::monte_carlo::MonteCarloForecaster;
use stock_forecaster::indicator;
use stock_forecaster::model::{ForecastMethod, ForecastPoint, PriceBar, PriceHistory};

// ── Strategies (proptest) ────────────────────────────────────────────

fn history_from_returns(start: f64, returns: &[f64]) -> PriceHistory {
    let first = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut close = start;
    let bars = std::iter::once(0.0)
        .chain(returns.iter().copied())
        .enumerate()
        .map(|(i, r)| {
            close *= 1.0 + r;
            PriceBar {
                date: first + Duration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 10_000.0,
            }
        })
        .collect();
    PriceHistory::new(bars).unwrap()
}

/// Daily random walk of 60..150 bars with returns within ±8%.
fn arb_history() -> impl Strategy<Value = PriceHistory> {
    (
        5.0..500.0_f64,
        prop::collection::vec(-0.08..0.08_f64, 59..150),
    )
        .prop_map(|(start, returns)| history_from_returns(start, &returns))
}

fn arb_horizon() -> impl Strategy<Value = u32> {
    1..60_u32
}

fn points(prices: [f64; 3]) -> Vec<ForecastPoint> {
    ForecastMethod::ALL
        .iter()
        .zip(prices)
        .map(|(&m, p)| ForecastPoint::new(m, 30, p, p * 0.9, p * 1.1).unwrap())
        .collect()
}

// ── 1-3. Ranges and bound ordering ───────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// A full analysis never leaves its declared ranges.
    #[test]
    fn analysis_respects_ranges(
        history in arb_history(),
        horizon in arb_horizon(),
        seed in any::<u64>(),
    ) {
        let request = AnalysisRequest::new("PROP").with_horizon(horizon);
        let report = analyze(&request, &history, &mut StdRng::seed_from_u64(seed)).unwrap();

        prop_assert!((0.0..=100.0).contains(&report.technical.rsi));
        prop_assert!(report.confidence.score <= 100);
        prop_assert!(report.technical.bollinger_lower <= report.technical.bollinger_mid);
        prop_assert!(report.technical.bollinger_mid <= report.technical.bollinger_upper);

        for point in report.forecasts.points() {
            prop_assert!(point.predicted_price > 0.0);
            prop_assert!(point.lower_bound <= point.predicted_price);
            prop_assert!(point.predicted_price <= point.upper_bound);
        }

        let e = &report.ensemble;
        prop_assert!(e.lower_bound <= e.predicted_price);
        prop_assert!(e.predicted_price <= e.upper_bound);

        let prices = e.component_prices();
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(min <= e.predicted_price && e.predicted_price <= max);
    }

    /// The snapshot is defined for any history at least as long as it needs.
    #[test]
    fn snapshot_rsi_in_range(history in arb_history()) {
        let snapshot = indicator::snapshot(&history, &EngineConfig::default().indicators).unwrap();
        prop_assert!((0.0..=100.0).contains(&snapshot.rsi));
        prop_assert!(snapshot.ma_short > 0.0 && snapshot.ma_long > 0.0);
    }
}

// ── 3. Weighted-mean property ────────────────────────────────────────

proptest! {
    /// With any non-negative weights the ensemble stays inside the components.
    #[test]
    fn ensemble_between_components(
        a in 1.0..1000.0_f64,
        b in 1.0..1000.0_f64,
        c in 1.0..1000.0_f64,
        w1 in 0.0..5.0_f64,
        w2 in 0.0..5.0_f64,
        w3 in 0.1..5.0_f64,
    ) {
        let config = EnsembleConfig { linear_trend: w1, moving_average: w2, monte_carlo: w3 };
        let result = EnsembleCombiner::new(&config).unwrap().combine(&points([a, b, c]), 100.0).unwrap();
        let min = a.min(b).min(c);
        let max = a.max(b).max(c);
        prop_assert!(min <= result.predicted_price && result.predicted_price <= max);
        prop_assert!(result.lower_bound <= result.predicted_price);
        prop_assert!(result.predicted_price <= result.upper_bound);
    }
}

// ── 4. Confidence monotonicity ───────────────────────────────────────

proptest! {
    /// Spreading the component forecasts further apart never raises the score.
    #[test]
    fn confidence_monotone_in_dispersion(
        center in 10.0..1000.0_f64,
        spread in 0.0..0.3_f64,
        extra in 0.0..0.3_f64,
        volatility in 0.0..120.0_f64,
    ) {
        let combiner = EnsembleCombiner::new(&EnsembleConfig::default()).unwrap();
        let scorer = ConfidenceScorer::new(&ConfidenceConfig::default());

        let tight = combiner
            .combine(&points([center * (1.0 - spread), center, center * (1.0 + spread)]), center)
            .unwrap();
        let wide_spread = spread + extra;
        let wide = combiner
            .combine(&points([center * (1.0 - wide_spread), center, center * (1.0 + wide_spread)]), center)
            .unwrap();

        let tight_score = scorer.score(&tight, volatility);
        let wide_score = scorer.score(&wide, volatility);
        prop_assert!(wide_score.score <= tight_score.score);
    }

    /// Higher historical volatility never raises the score either.
    #[test]
    fn confidence_monotone_in_volatility(
        spread in 0.0..0.3_f64,
        low in 0.0..100.0_f64,
        extra in 0.0..100.0_f64,
    ) {
        let combiner = EnsembleCombiner::new(&EnsembleConfig::default()).unwrap();
        let scorer = ConfidenceScorer::new(&ConfidenceConfig::default());
        let ensemble = combiner
            .combine(&points([100.0 * (1.0 - spread), 100.0, 100.0 * (1.0 + spread)]), 100.0)
            .unwrap();
        prop_assert!(scorer.score(&ensemble, low + extra).score <= scorer.score(&ensemble, low).score);
    }
}

// ── 5. Monte Carlo determinism ───────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn monte_carlo_reproducible_with_seed(
        history in arb_history(),
        horizon in arb_horizon(),
        seed in any::<u64>(),
    ) {
        let forecaster = MonteCarloForecaster::new(&MonteCarloConfig::default());
        let a = forecaster.forecast(&history, horizon, &mut StdRng::seed_from_u64(seed)).unwrap();
        let b = forecaster.forecast(&history, horizon, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(a, b);
    }
}
