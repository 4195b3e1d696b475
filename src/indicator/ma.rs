use error_stack::{Report, bail};

use crate::error::ForecastError;
use crate::indicator::{Indicator, close_prices};
use crate::model::PriceBar;

/// Simple Moving Average.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, Report<ForecastError>> {
        if period == 0 {
            bail!(ForecastError::InvalidParameter {
                name: "sma period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Vec<f64>, Report<ForecastError>> {
        if prices.len() < self.period {
            bail!(ForecastError::insufficient(
                self.name(),
                self.period,
                prices.len()
            ));
        }
        Ok(prices
            .windows(self.period)
            .map(|w| w.iter().sum::<f64>() / self.period as f64)
            .collect())
    }

    /// Mean of the last `period` prices.
    pub fn latest(&self, prices: &[f64]) -> Result<f64, Report<ForecastError>> {
        if prices.len() < self.period {
            bail!(ForecastError::insufficient(
                self.name(),
                self.period,
                prices.len()
            ));
        }
        let window = &prices[prices.len() - self.period..];
        Ok(window.iter().sum::<f64>() / self.period as f64)
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        "sma"
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, Report<ForecastError>> {
        self.calculate_prices(&close_prices(bars))
    }
}

/// Exponential Moving Average.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, Report<ForecastError>> {
        if period == 0 {
            bail!(ForecastError::InvalidParameter {
                name: "ema period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    pub fn calculate_prices(&self, prices: &[f64]) -> Result<Vec<f64>, Report<ForecastError>> {
        if prices.len() < self.period {
            bail!(ForecastError::insufficient("ema", self.period, prices.len()));
        }

        let k = 2.0 / (self.period as f64 + 1.0);
        // Seed with SMA of first `period` values
        let seed: f64 = prices[..self.period].iter().sum::<f64>() / self.period as f64;
        let mut ema = seed;
        let mut results = Vec::with_capacity(prices.len() - self.period + 1);
        results.push(ema);

        for &price in &prices[self.period..] {
            ema = price * k + ema * (1.0 - k);
            results.push(ema);
        }

        Ok(results)
    }
}
