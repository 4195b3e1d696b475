use std::path::Path;

use error_stack::{Report, ResultExt, bail};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ForecastError};

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Reports are written as `<ticker>.json` here; stdout when unset.
    pub output_dir: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub ticker: String,
    /// Path to a `date,open,high,low,close,volume` CSV file.
    pub history: String,
    /// Number of trailing bars to analyse; all bars when unset.
    pub lookback: Option<usize>,
    pub horizon_days: Option<u32>,
    /// Fixed Monte Carlo seed for reproducible runs.
    pub seed: Option<u64>,
}

/// Tunables for every engine component. Each section falls back to its
/// defaults when omitted from the TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub horizon_days: u32,
    pub indicators: IndicatorConfig,
    pub trend: TrendConfig,
    pub moving_average: MovingAverageConfig,
    pub monte_carlo: MonteCarloConfig,
    pub ensemble: EnsembleConfig,
    pub confidence: ConfidenceConfig,
    pub signal: SignalConfig,
    pub outlook: OutlookConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            indicators: IndicatorConfig::default(),
            trend: TrendConfig::default(),
            moving_average: MovingAverageConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
            ensemble: EnsembleConfig::default(),
            confidence: ConfidenceConfig::default(),
            signal: SignalConfig::default(),
            outlook: OutlookConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ma_short: usize,
    pub ma_long: usize,
    pub bollinger_period: usize,
    pub bollinger_stddev: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ma_short: 20,
            ma_long: 50,
            bollinger_period: 20,
            bollinger_stddev: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Half-width of the band in residual standard errors, before the
    /// square-root-of-horizon scaling.
    pub band_multiplier: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            band_multiplier: 1.96,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingAverageConfig {
    pub short_window: usize,
    pub long_window: usize,
    /// Largest relative move allowed over the whole horizon (0.5 = ±50%).
    pub max_move: f64,
    pub band_multiplier: f64,
    /// Number of trailing daily returns used for the band volatility.
    pub volatility_window: usize,
}

impl Default for MovingAverageConfig {
    fn default() -> Self {
        Self {
            short_window: 10,
            long_window: 30,
            max_move: 0.5,
            band_multiplier: 2.0,
            volatility_window: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub simulations: usize,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            simulations: 1000,
            lower_percentile: 0.05,
            upper_percentile: 0.95,
        }
    }
}

/// Relative weights per method; normalized before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub linear_trend: f64,
    pub moving_average: f64,
    pub monte_carlo: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            linear_trend: 1.0,
            moving_average: 1.0,
            monte_carlo: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Score points lost per percentage point of inter-method dispersion.
    pub dispersion_penalty: f64,
    /// Score points lost per percentage point of annualized volatility.
    pub volatility_penalty: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            dispersion_penalty: 4.0,
            volatility_penalty: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub overbought: f64,
    pub oversold: f64,
    pub strong_return_percent: f64,
    pub return_percent: f64,
    /// Net score at or beyond which the signal becomes strong_buy / strong_sell.
    pub strong_net_score: i32,
    /// MACD histogram magnitudes at or below this fraction of the current
    /// price count as zero.
    pub macd_tolerance: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            overbought: 70.0,
            oversold: 30.0,
            strong_return_percent: 10.0,
            return_percent: 3.0,
            strong_net_score: 3,
            macd_tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlookConfig {
    pub high_risk_volatility_percent: f64,
    pub strong_return_percent: f64,
    pub neutral_band_percent: f64,
}

impl Default for OutlookConfig {
    fn default() -> Self {
        Self {
            high_risk_volatility_percent: 50.0,
            strong_return_percent: 10.0,
            neutral_band_percent: 5.0,
        }
    }
}

impl EngineConfig {
    /// Check parameter relationships the individual calculators rely on.
    pub fn validate(&self) -> Result<(), Report<ForecastError>> {
        let ind = &self.indicators;
        let ma = &self.moving_average;
        let mc = &self.monte_carlo;
        let w = &self.ensemble;
        let sig = &self.signal;

        check(self.horizon_days > 0, "horizon_days must be > 0")?;
        check(
            ind.rsi_period > 0
                && ind.macd_fast > 0
                && ind.macd_signal > 0
                && ind.ma_short > 0
                && ind.bollinger_period > 0,
            "indicator periods must be > 0",
        )?;
        check(
            ind.macd_fast < ind.macd_slow,
            "indicators.macd_fast must be < macd_slow",
        )?;
        check(
            ind.ma_short < ind.ma_long,
            "indicators.ma_short must be < ma_long",
        )?;
        check(
            ind.bollinger_stddev > 0.0,
            "indicators.bollinger_stddev must be > 0",
        )?;
        check(
            ma.short_window > 0 && ma.short_window < ma.long_window,
            "moving_average.short_window must be > 0 and < long_window",
        )?;
        check(
            ma.max_move > 0.0 && ma.max_move < 1.0,
            "moving_average.max_move must be in (0, 1)",
        )?;
        check(
            ma.band_multiplier >= 0.0 && ma.volatility_window >= 2,
            "moving_average.band_multiplier must be >= 0 and volatility_window >= 2",
        )?;
        check(
            self.trend.band_multiplier >= 0.0,
            "trend.band_multiplier must be >= 0",
        )?;
        check(mc.simulations > 0, "monte_carlo.simulations must be > 0")?;
        check(
            (0.0..0.5).contains(&mc.lower_percentile)
                && mc.upper_percentile > 0.5
                && mc.upper_percentile <= 1.0,
            "monte_carlo percentiles must satisfy 0 <= lower < 0.5 < upper <= 1",
        )?;
        check(
            w.linear_trend >= 0.0
                && w.moving_average >= 0.0
                && w.monte_carlo >= 0.0
                && w.linear_trend + w.moving_average + w.monte_carlo > 0.0,
            "ensemble weights must be non-negative with a positive sum",
        )?;
        check(
            self.confidence.dispersion_penalty >= 0.0 && self.confidence.volatility_penalty >= 0.0,
            "confidence penalties must be >= 0",
        )?;
        check(
            sig.oversold < sig.overbought,
            "signal.oversold must be < overbought",
        )?;
        check(
            sig.return_percent > 0.0 && sig.strong_return_percent > sig.return_percent,
            "signal return thresholds must satisfy 0 < return_percent < strong_return_percent",
        )?;
        check(
            sig.strong_net_score > 0 && sig.macd_tolerance >= 0.0,
            "signal.strong_net_score must be > 0 and macd_tolerance >= 0",
        )?;
        Ok(())
    }
}

fn check(condition: bool, message: &str) -> Result<(), Report<ForecastError>> {
    if !condition {
        bail!(ForecastError::InvalidParameter {
            name: message.to_string(),
        });
    }
    Ok(())
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    config
        .engine
        .validate()
        .change_context(ConfigError::Validation {
            field: "engine".into(),
        })?;
    validate_instruments(config)?;
    Ok(())
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "general.log_format \"{}\" is not valid",
                config.general.log_format
            ),
        }));
    }
    Ok(())
}

fn validate_instruments(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let mut seen = std::collections::HashSet::new();
    for instrument in &config.instruments {
        if instrument.ticker.trim().is_empty() {
            return Err(Report::new(ConfigError::Validation {
                field: "instruments: ticker must not be empty".into(),
            }));
        }
        if !seen.insert(instrument.ticker.as_str()) {
            return Err(Report::new(ConfigError::Validation {
                field: format!("instruments: duplicate ticker \"{}\"", instrument.ticker),
            }));
        }
        if instrument.horizon_days == Some(0) {
            return Err(Report::new(ConfigError::Validation {
                field: format!("instruments[\"{}\"].horizon_days must be > 0", instrument.ticker),
            }));
        }
        if instrument.lookback == Some(0) {
            return Err(Report::new(ConfigError::Validation {
                field: format!("instruments[\"{}\"].lookback must be > 0", instrument.ticker),
            }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"
output_dir = "/tmp/reports"

[engine]
horizon_days = 14

[engine.indicators]
rsi_period = 10

[engine.monte_carlo]
simulations = 500

[engine.ensemble]
linear_trend = 2.0
moving_average = 1.0
monte_carlo = 1.0

[[instruments]]
ticker = "AAPL"
history = "data/aapl.csv"
lookback = 126
seed = 7
"#;
        let config = parse(toml);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.engine.horizon_days, 14);
        assert_eq!(config.engine.indicators.rsi_period, 10);
        assert_eq!(config.engine.indicators.macd_slow, 26);
        assert_eq!(config.engine.monte_carlo.simulations, 500);
        assert_eq!(config.engine.ensemble.linear_trend, 2.0);
        assert_eq!(config.instruments.len(), 1);
        assert_eq!(config.instruments[0].seed, Some(7));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let config = parse("");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert!(config.general.output_dir.is_none());
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.horizon_days, 30);
        assert_eq!(config.engine.monte_carlo.simulations, 1000);
        assert!(config.instruments.is_empty());
    }

    #[test]
    fn default_engine_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn macd_fast_not_below_slow_rejected() {
        let config = parse(
            r#"
[engine.indicators]
macd_fast = 26
macd_slow = 12
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_ensemble_weights_rejected() {
        let config = parse(
            r#"
[engine.ensemble]
linear_trend = 0.0
moving_average = 0.0
monte_carlo = 0.0
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn negative_weight_rejected() {
        let mut engine = EngineConfig::default();
        engine.ensemble.monte_carlo = -1.0;
        let err = engine.validate().unwrap_err();
        assert!(matches!(
            err.current_context(),
            ForecastError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn duplicate_tickers_rejected() {
        let config = parse(
            r#"
[[instruments]]
ticker = "MSFT"
history = "a.csv"

[[instruments]]
ticker = "MSFT"
history = "b.csv"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let config = parse(
            r#"
[general]
log_format = "xml"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn monte_carlo_percentiles_must_bracket_median() {
        for (lower, upper) in [(0.5, 0.95), (0.6, 0.9), (0.05, 0.5), (0.1, 0.4), (-0.1, 0.9)] {
            let mut engine = EngineConfig::default();
            engine.monte_carlo.lower_percentile = lower;
            engine.monte_carlo.upper_percentile = upper;
            assert!(engine.validate().is_err(), "{lower}..{upper} accepted");
        }

        let mut engine = EngineConfig::default();
        engine.monte_carlo.lower_percentile = 0.0;
        engine.monte_carlo.upper_percentile = 1.0;
        assert!(engine.validate().is_ok());
    }

    #[test]
    fn signal_thresholds_must_be_ordered() {
        let mut engine = EngineConfig::default();
        engine.signal.return_percent = 12.0;
        assert!(engine.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load(Path::new("/nonexistent/forecaster.toml")).unwrap_err();
        assert!(matches!(err.current_context(), ConfigError::ReadFile));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[engine]\nhorizon_days = 5\n\n[[instruments]]\nticker = \"SPY\"\nhistory = \"spy.csv\"\n",
        )
        .unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.engine.horizon_days, 5);
        assert_eq!(config.instruments[0].ticker, "SPY");
    }
}
