use std::collections::BTreeSet;

use crate::config::SignalConfig;
use crate::model::{EnsembleResult, Signal, SignalFlag, SignalKind, TechnicalSnapshot};

/// Threshold test applied to one indicator reading.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Condition {
    Above(f64),
    Below(f64),
    /// Previous value below the threshold, current at or above it.
    CrossUp(f64),
    /// Previous value at or above the threshold, current below it.
    CrossDown(f64),
}

impl Condition {
    /// Level test on the current reading alone.
    fn holds(self, current: f64) -> bool {
        match self {
            Self::Above(threshold) => current > threshold,
            Self::Below(threshold) => current < threshold,
            Self::CrossUp(_) | Self::CrossDown(_) => false,
        }
    }

    /// Crossing test between the previous and current readings.
    fn crossed(self, current: f64, previous: f64) -> bool {
        match self {
            Self::CrossUp(threshold) => previous < threshold && current >= threshold,
            Self::CrossDown(threshold) => previous >= threshold && current < threshold,
            Self::Above(_) | Self::Below(_) => self.holds(current),
        }
    }
}

/// Relative gap under which two moving averages count as equal.
const MA_RELATIVE_TOLERANCE: f64 = 1e-9;

/// Stateless rule evaluator turning indicators and the ensemble into a signal.
///
/// Every rule contributes at most one flag, each flag counts +1 or -1, and
/// the net score maps onto the five signal levels. A net score of zero is
/// always `hold`.
pub struct SignalGenerator {
    config: SignalConfig,
}

impl SignalGenerator {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn generate(&self, snapshot: &TechnicalSnapshot, ensemble: &EnsembleResult) -> Signal {
        let mut flags = BTreeSet::new();
        let cfg = &self.config;

        // A window with no losses leaves RSI at its fallback of 100, which
        // says nothing about overbought or oversold.
        if snapshot.rsi_average_loss > 0.0 {
            if Condition::Above(cfg.overbought).holds(snapshot.rsi) {
                flags.insert(SignalFlag::Overbought);
            } else if Condition::Below(cfg.oversold).holds(snapshot.rsi) {
                flags.insert(SignalFlag::Oversold);
            }
        }

        // MACD is in price units, so the zero band scales with the price.
        let zero = -cfg.macd_tolerance * ensemble.current_price.abs();
        let (hist, prev) = (snapshot.macd_histogram, snapshot.macd_histogram_previous);
        if Condition::CrossUp(zero).crossed(hist, prev) {
            flags.insert(SignalFlag::MacdBullishCross);
        } else if Condition::CrossDown(zero).crossed(hist, prev) {
            flags.insert(SignalFlag::MacdBearishCross);
        }

        let (short, long) = (snapshot.ma_short, snapshot.ma_long);
        if (short - long).abs() > MA_RELATIVE_TOLERANCE * long.abs() {
            if short > long {
                flags.insert(SignalFlag::MaBullish);
            } else {
                flags.insert(SignalFlag::MaBearish);
            }
        }

        let ret = ensemble.expected_return_percent;
        if ret > cfg.strong_return_percent {
            flags.insert(SignalFlag::StrongBullishMomentum);
        } else if ret > cfg.return_percent {
            flags.insert(SignalFlag::BullishMomentum);
        } else if ret < -cfg.strong_return_percent {
            flags.insert(SignalFlag::StrongBearishMomentum);
        } else if ret < -cfg.return_percent {
            flags.insert(SignalFlag::BearishMomentum);
        }

        let net_score: i32 = flags.iter().map(|f| f.direction()).sum();
        let kind = self.classify(net_score);

        tracing::debug!(%kind, net_score, flags = ?flags, "signal generated");

        Signal {
            kind,
            net_score,
            flags,
        }
    }

    fn classify(&self, net_score: i32) -> SignalKind {
        let strong = self.config.strong_net_score;
        match net_score {
            n if n >= strong => SignalKind::StrongBuy,
            n if n > 0 => SignalKind::Buy,
            0 => SignalKind::Hold,
            n if n <= -strong => SignalKind::StrongSell,
            _ => SignalKind::Sell,
        }
    }
}
