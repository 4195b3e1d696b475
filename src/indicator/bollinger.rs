use error_stack::{Report, bail};

use crate::error::ForecastError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, close_prices};
use crate::model::PriceBar;
use crate::stats;

pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self, Report<ForecastError>> {
        if period == 0 {
            bail!(ForecastError::InvalidParameter {
                name: "bollinger period must be > 0".into(),
            });
        }
        if std_dev_multiplier.is_nan() || std_dev_multiplier <= 0.0 {
            bail!(ForecastError::InvalidParameter {
                name: "bollinger std_dev_multiplier must be > 0".into(),
            });
        }
        Ok(Self {
            period,
            std_dev_multiplier,
        })
    }

    /// Returns (upper, middle, lower) band values.
    ///
    /// The width uses the sample standard deviation of the window.
    pub fn calculate_bands(
        &self,
        prices: &[f64],
    ) -> Result<Vec<(f64, f64, f64)>, Report<ForecastError>> {
        if prices.len() < self.period {
            bail!(ForecastError::insufficient(
                self.name(),
                self.period,
                prices.len()
            ));
        }

        let sma = Sma::new(self.period)?.calculate_prices(prices)?;

        Ok(prices
            .windows(self.period)
            .zip(sma.iter())
            .map(|(window, &middle)| {
                let width = self.std_dev_multiplier * stats::sample_std_dev(window);
                (middle + width, middle, middle - width)
            })
            .collect())
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &str {
        "bollinger"
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    /// Returns middle band (SMA) values only.
    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, Report<ForecastError>> {
        Ok(self
            .calculate_bands(&close_prices(bars))?
            .into_iter()
            .map(|(_, m, _)| m)
            .collect())
    }
}
