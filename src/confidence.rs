use crate::config::ConfidenceConfig;
use crate::model::{Agreement, ConfidenceLevel, ConfidenceResult, EnsembleResult};

/// Dispersion (percent) below which the methods are said to agree closely.
const HIGH_AGREEMENT: f64 = 5.0;
const MODERATE_AGREEMENT: f64 = 15.0;

/// Scores how much to trust an ensemble.
///
/// `score = clamp(100 - dispersion_penalty * dispersion - volatility_penalty * volatility, 0, 100)`
/// where dispersion is the root-mean-square deviation of the component
/// predictions from the ensemble prediction, in percent of it, and volatility
/// is the annualized historical volatility in percent. Both terms only ever
/// subtract, so more disagreement or more volatility never raises the score.
pub struct ConfidenceScorer {
    dispersion_penalty: f64,
    volatility_penalty: f64,
}

impl ConfidenceScorer {
    pub fn new(config: &ConfidenceConfig) -> Self {
        Self {
            dispersion_penalty: config.dispersion_penalty,
            volatility_penalty: config.volatility_penalty,
        }
    }

    pub fn score(
        &self,
        ensemble: &EnsembleResult,
        historical_volatility_percent: f64,
    ) -> ConfidenceResult {
        let dispersion_percent = dispersion_percent(ensemble);
        let raw = 100.0
            - self.dispersion_penalty * dispersion_percent
            - self.volatility_penalty * historical_volatility_percent;
        // NaN only arises from non-finite inputs; treat it as no confidence.
        let score = if raw.is_nan() {
            0
        } else {
            raw.clamp(0.0, 100.0).round() as u8
        };

        let agreement = if dispersion_percent < HIGH_AGREEMENT {
            Agreement::High
        } else if dispersion_percent < MODERATE_AGREEMENT {
            Agreement::Moderate
        } else {
            Agreement::Low
        };

        ConfidenceResult {
            score,
            level: ConfidenceLevel::from_score(score),
            dispersion_percent,
            historical_volatility_percent,
            agreement,
        }
    }
}

fn dispersion_percent(ensemble: &EnsembleResult) -> f64 {
    let prices = ensemble.component_prices();
    if prices.is_empty() {
        return 0.0;
    }
    let center = ensemble.predicted_price;
    let mean_square = prices
        .iter()
        .map(|p| ((p - center) / center).powi(2))
        .sum::<f64>()
        / prices.len() as f64;
    mean_square.sqrt() * 100.0
}
