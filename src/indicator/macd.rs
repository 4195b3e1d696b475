use error_stack::{Report, bail};

use crate::error::ForecastError;
use crate::indicator::ma::Ema;
use crate::indicator::{Indicator, close_prices};
use crate::model::PriceBar;

pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Report<ForecastError>> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            bail!(ForecastError::InvalidParameter {
                name: "macd periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(ForecastError::InvalidParameter {
                name: "macd fast period must be < slow period".into(),
            });
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
        })
    }

    /// Calculate (macd_line, signal_line, histogram) tuples.
    pub fn calculate_prices(
        &self,
        prices: &[f64],
    ) -> Result<Vec<(f64, f64, f64)>, Report<ForecastError>> {
        if prices.len() < self.required_bars() {
            bail!(ForecastError::insufficient(
                self.name(),
                self.required_bars(),
                prices.len()
            ));
        }

        let fast_ema = Ema::new(self.fast_period)?.calculate_prices(prices)?;
        let slow_ema = Ema::new(self.slow_period)?.calculate_prices(prices)?;

        // Align: slow_ema is shorter by (slow_period - fast_period) elements
        let offset = self.slow_period - self.fast_period;
        let macd_line: Vec<f64> = fast_ema[offset..]
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();

        let signal_line = Ema::new(self.signal_period)?.calculate_prices(&macd_line)?;
        // Signal is shorter by (signal_period - 1)
        let signal_offset = self.signal_period - 1;

        Ok(macd_line[signal_offset..]
            .iter()
            .zip(signal_line.iter())
            .map(|(&m, &s)| (m, s, m - s))
            .collect())
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    fn required_bars(&self) -> usize {
        self.slow_period + self.signal_period
    }

    /// Returns MACD line values only.
    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, Report<ForecastError>> {
        Ok(self
            .calculate_prices(&close_prices(bars))?
            .into_iter()
            .map(|(m, _, _)| m)
            .collect())
    }
}
