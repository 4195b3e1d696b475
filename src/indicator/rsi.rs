use error_stack::{Report, bail};

use crate::error::ForecastError;
use crate::indicator::{Indicator, close_prices};
use crate::model::PriceBar;

/// RSI (Relative Strength Index) using Wilder's smoothing method.
pub struct Rsi {
    period: usize,
}

/// RSI value together with the smoothed averages it was derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiReading {
    pub value: f64,
    pub average_gain: f64,
    pub average_loss: f64,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<ForecastError>> {
        if period == 0 {
            bail!(ForecastError::InvalidParameter {
                name: "rsi period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    pub fn readings(&self, prices: &[f64]) -> Result<Vec<RsiReading>, Report<ForecastError>> {
        if prices.len() < self.required_bars() {
            bail!(ForecastError::insufficient(
                self.name(),
                self.required_bars(),
                prices.len()
            ));
        }

        let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
        let period = self.period as f64;

        // Seed using simple average of first `period` gains/losses
        let mut avg_gain: f64 = deltas[..self.period]
            .iter()
            .map(|&d| d.max(0.0))
            .sum::<f64>()
            / period;
        let mut avg_loss: f64 = deltas[..self.period]
            .iter()
            .map(|&d| (-d).max(0.0))
            .sum::<f64>()
            / period;

        let mut results = Vec::with_capacity(deltas.len() - self.period + 1);
        results.push(reading(avg_gain, avg_loss));

        for &delta in &deltas[self.period..] {
            let gain = delta.max(0.0);
            let loss = (-delta).max(0.0);
            avg_gain = (avg_gain * (period - 1.0) + gain) / period;
            avg_loss = (avg_loss * (period - 1.0) + loss) / period;
            results.push(reading(avg_gain, avg_loss));
        }

        Ok(results)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn required_bars(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, Report<ForecastError>> {
        Ok(self
            .readings(&close_prices(bars))?
            .into_iter()
            .map(|r| r.value)
            .collect())
    }
}

fn reading(average_gain: f64, average_loss: f64) -> RsiReading {
    RsiReading {
        value: rsi_value(average_gain, average_loss),
        average_gain,
        average_loss,
    }
}

/// Zero average loss is defined as RSI 100, including a window with no movement.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::bars_from_closes;

    #[test]
    fn rsi_insufficient_data() {
        let rsi = Rsi::new(14).unwrap();
        assert!(rsi.calculate(&bars_from_closes(&[1.0; 10])).is_err());
    }

    #[test]
    fn rsi_period_zero_invalid() {
        assert!(Rsi::new(0).is_err());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let rsi = Rsi::new(3).unwrap();
        let values = rsi.calculate(&bars_from_closes(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(values[0], 100.0);
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let rsi = Rsi::new(3).unwrap();
        let values = rsi.calculate(&bars_from_closes(&[4.0, 3.0, 2.0, 1.0])).unwrap();
        assert!(values[0].abs() < 1e-9);
    }

    #[test]
    fn rsi_flat_prices_use_zero_loss_fallback() {
        let rsi = Rsi::new(3).unwrap();
        let readings = rsi.readings(&[5.0; 8]).unwrap();
        for r in readings {
            assert_eq!(r.value, 100.0);
            assert_eq!(r.average_gain, 0.0);
            assert_eq!(r.average_loss, 0.0);
        }
    }

    #[test]
    fn rsi_known_mixed_value() {
        let rsi = Rsi::new(2).unwrap();
        // deltas: +2, -1 -> avg_gain 1.0, avg_loss 0.5 -> rs 2 -> 66.67
        let values = rsi.calculate(&bars_from_closes(&[10.0, 12.0, 11.0])).unwrap();
        assert!((values[0] - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_output_length() {
        let rsi = Rsi::new(14).unwrap();
        let values = rsi.calculate(&bars_from_closes(&[100.0_f64; 20])).unwrap();
        // 20 prices -> 19 deltas -> 1 seed + 5 subsequent = 6 values
        assert_eq!(values.len(), 20 - 14);
    }
}
