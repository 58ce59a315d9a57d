use crate::domain::bar::Bar;
use crate::domain::indicators;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const MIN_WINDOW: usize = 20;
const BASELINE_WINDOW: usize = 60;
const ATR_MEDIAN_WINDOW: usize = 50;
/// A 20-bar move of this magnitude or more counts as a fully-saturated trend
/// signal in `trend_score`/`range_score`.
const MOMENTUM_REFERENCE: Decimal = dec!(0.05);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    Trend,
    Sideways,
    Volatile,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Trend => write!(f, "TREND"),
            Regime::Sideways => write!(f, "SIDEWAYS"),
            Regime::Volatile => write!(f, "VOLATILE"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeReading {
    pub regime: Regime,
    pub confidence_trend: Decimal,
    pub confidence_sideways: Decimal,
    pub confidence_volatile: Decimal,
    pub computed_at: DateTime<Utc>,
    pub initializing: bool,
}

impl RegimeReading {
    pub fn confidence_of(&self, regime: Regime) -> Decimal {
        match regime {
            Regime::Trend => self.confidence_trend,
            Regime::Sideways => self.confidence_sideways,
            Regime::Volatile => self.confidence_volatile,
        }
    }
}

/// Weights `w1..w6` from the three-score model; default all 1.0.
#[derive(Debug, Clone, Copy)]
pub struct RegimeWeights {
    pub w1: Decimal,
    pub w2: Decimal,
    pub w3: Decimal,
    pub w4: Decimal,
    pub w5: Decimal,
    pub w6: Decimal,
}

impl Default for RegimeWeights {
    fn default() -> Self {
        Self {
            w1: Decimal::ONE,
            w2: Decimal::ONE,
            w3: Decimal::ONE,
            w4: Decimal::ONE,
            w5: Decimal::ONE,
            w6: Decimal::ONE,
        }
    }
}

pub struct RegimeClassifier {
    weights: RegimeWeights,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new(RegimeWeights::default())
    }
}

impl RegimeClassifier {
    pub fn new(weights: RegimeWeights) -> Self {
        Self { weights }
    }

    /// Pure function of `window`: same bars in, same `RegimeReading` out.
    pub fn classify(&self, window: &[Bar], now: DateTime<Utc>) -> RegimeReading {
        if window.len() < MIN_WINDOW {
            let third = Decimal::ONE / Decimal::from(3);
            return RegimeReading {
                regime: Regime::Trend,
                confidence_trend: third,
                confidence_sideways: third,
                confidence_volatile: third,
                computed_at: now,
                initializing: true,
            };
        }

        let trend_score = self.trend_score(window);
        let range_score = self.range_score(window);
        let vol_score = self.vol_score(window);

        let (confidence_trend, confidence_sideways, confidence_volatile) =
            softmax3(trend_score, range_score, vol_score);

        // Ties break TREND > SIDEWAYS > VOLATILE.
        let regime = if trend_score >= range_score && trend_score >= vol_score {
            Regime::Trend
        } else if range_score >= vol_score {
            Regime::Sideways
        } else {
            Regime::Volatile
        };

        RegimeReading {
            regime,
            confidence_trend,
            confidence_sideways,
            confidence_volatile,
            computed_at: now,
            initializing: false,
        }
    }

    /// `|momentum(20)|` scaled against a 5% reference move and clamped to
    /// [0,1]. A raw fractional return is almost always tiny (a few percent),
    /// so using it unscaled in `trend_score`/`range_score` would leave
    /// `(1 - momentum)` near 1 for every realistic window and make SIDEWAYS
    /// win by default regardless of how clean the trend is.
    fn normalized_momentum(&self, window: &[Bar]) -> Decimal {
        let momentum = indicators::momentum(window, 20).unwrap_or(Decimal::ZERO).abs();
        clamp01(momentum / MOMENTUM_REFERENCE)
    }

    fn trend_score(&self, window: &[Bar]) -> Decimal {
        let momentum = self.normalized_momentum(window);
        let sma20 = indicators::sma(window, 20);
        let sma50 = indicators::sma(window, 50);
        let close = window.last().map(|b| b.close).unwrap_or(Decimal::ONE);
        let trend_strength = match (sma20, sma50) {
            (Some(s20), Some(s50)) if close != Decimal::ZERO => {
                clamp01((s20 - s50).abs() / close)
            }
            _ => Decimal::ZERO,
        };
        clamp_min0(self.weights.w1 * momentum + self.weights.w2 * trend_strength)
    }

    fn range_score(&self, window: &[Bar]) -> Decimal {
        let momentum = self.normalized_momentum(window);
        let vol_z = self.vol_z(window);
        clamp_min0(
            self.weights.w3 * (Decimal::ONE - momentum)
                + self.weights.w4 * (Decimal::ONE - clamp01(vol_z)),
        )
    }

    /// Both `vol_z` and `range_expansion` are ratios centered on 1.0 (recent
    /// matches baseline). Used raw, a perfectly ordinary reading of "1" would
    /// contribute a full point to `vol_score` from each term, so VOLATILE
    /// would dominate even in calm markets. Scoring the *excess* over
    /// baseline instead keeps `vol_score` near zero until something actually
    /// expands.
    fn vol_score(&self, window: &[Bar]) -> Decimal {
        let vol_z = self.vol_z(window);
        let range_expansion = self.range_expansion(window);
        clamp_min0(
            self.weights.w5 * clamp_min0(vol_z - Decimal::ONE)
                + self.weights.w6 * clamp_min0(range_expansion - Decimal::ONE),
        )
    }

    /// Recent volatility normalized against a longer baseline; 1.0 means
    /// "as volatile as the trailing baseline window".
    fn vol_z(&self, window: &[Bar]) -> Decimal {
        let recent = indicators::volatility(window, 20);
        let baseline_len = window.len().min(BASELINE_WINDOW);
        let baseline = indicators::volatility(window, baseline_len.saturating_sub(1).max(20));
        match (recent, baseline) {
            (Some(r), Some(b)) if b != Decimal::ZERO => r / b,
            (Some(r), _) if r == Decimal::ZERO => Decimal::ZERO,
            (Some(_), _) => Decimal::ONE,
            _ => Decimal::ZERO,
        }
    }

    /// Current ATR14 vs the median ATR14 over the trailing 50-bar window.
    fn range_expansion(&self, window: &[Bar]) -> Decimal {
        let current = match indicators::atr(window, 14) {
            Some(v) => v,
            None => return Decimal::ZERO,
        };
        let baseline = atr_median(window, ATR_MEDIAN_WINDOW);
        match baseline {
            Some(b) if b != Decimal::ZERO => current / b,
            _ => Decimal::ONE,
        }
    }
}

/// Median of the ATR14 series computed at every index over the trailing
/// `lookback` bars. Used as the "ATR baseline" referenced by the regime
/// classifier and by `VolatilityBreakout`'s contraction filter.
pub fn atr_median(window: &[Bar], lookback: usize) -> Option<Decimal> {
    let start = window.len().saturating_sub(lookback);
    let slice = &window[start..];
    let mut samples: Vec<Decimal> = Vec::new();
    for end in 15..=slice.len() {
        if let Some(v) = indicators::atr(&slice[..end], 14) {
            samples.push(v);
        }
    }
    if samples.is_empty() {
        return None;
    }
    samples.sort();
    Some(samples[samples.len() / 2])
}

fn clamp01(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::ONE)
}

fn clamp_min0(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// Softmax of three scores, computed in `f64` (exp has no exact `Decimal`
/// form) and converted back; falls back to a normalize-sum if any score
/// fails to convert or all three are zero.
fn softmax3(a: Decimal, b: Decimal, c: Decimal) -> (Decimal, Decimal, Decimal) {
    let normalize_sum = |a: Decimal, b: Decimal, c: Decimal| {
        let total = a + b + c;
        if total == Decimal::ZERO {
            let third = Decimal::ONE / Decimal::from(3);
            (third, third, third)
        } else {
            (a / total, b / total, c / total)
        }
    };

    let (fa, fb, fc) = match (a.to_f64(), b.to_f64(), c.to_f64()) {
        (Some(fa), Some(fb), Some(fc)) => (fa, fb, fc),
        _ => return normalize_sum(a, b, c),
    };
    let max = fa.max(fb).max(fc);
    let ea = (fa - max).exp();
    let eb = (fb - max).exp();
    let ec = (fc - max).exp();
    let sum = ea + eb + ec;
    match (
        Decimal::from_f64(ea / sum),
        Decimal::from_f64(eb / sum),
        Decimal::from_f64(ec / sum),
    ) {
        (Some(da), Some(db), Some(dc)) => {
            // Guard against floating drift so confidences sum to exactly 1.
            let total = da + db + dc;
            if total == Decimal::ZERO {
                normalize_sum(a, b, c)
            } else {
                (da / total, db / total, dc / total)
            }
        }
        _ => normalize_sum(a, b, c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open_time: i64, price: Decimal) -> Bar {
        Bar {
            symbol: "TEST".to_string(),
            open_time,
            open: price,
            high: price + dec!(0.5),
            low: price - dec!(0.5),
            close: price,
            volume: Decimal::from(1000),
        }
    }

    #[test]
    fn short_window_is_initializing() {
        let classifier = RegimeClassifier::default();
        let bars: Vec<Bar> = (0..10).map(|i| bar(i, dec!(100))).collect();
        let reading = classifier.classify(&bars, Utc::now());
        assert!(reading.initializing);
        assert_eq!(reading.regime, Regime::Trend);
        let third = Decimal::ONE / Decimal::from(3);
        assert_eq!(reading.confidence_trend, third);
    }

    #[test]
    fn classify_is_pure() {
        let classifier = RegimeClassifier::default();
        let bars: Vec<Bar> = (0..60)
            .map(|i| bar(i, Decimal::from(100) + Decimal::from(i) * dec!(0.5)))
            .collect();
        let now = Utc::now();
        let r1 = classifier.classify(&bars, now);
        let r2 = classifier.classify(&bars, now);
        assert_eq!(r1.regime, r2.regime);
        assert_eq!(r1.confidence_trend, r2.confidence_trend);
    }

    #[test]
    fn confidences_sum_to_one() {
        let classifier = RegimeClassifier::default();
        let bars: Vec<Bar> = (0..60)
            .map(|i| bar(i, Decimal::from(100) + Decimal::from(i) * dec!(0.5)))
            .collect();
        let reading = classifier.classify(&bars, Utc::now());
        let sum = reading.confidence_trend + reading.confidence_sideways + reading.confidence_volatile;
        assert!((sum - Decimal::ONE).abs() < dec!(0.000000001));
    }

    #[test]
    fn strong_uptrend_resolves_to_trend() {
        let classifier = RegimeClassifier::default();
        let bars: Vec<Bar> = (0..60)
            .map(|i| bar(i, Decimal::from(100) + Decimal::from(i) * dec!(0.5)))
            .collect();
        let reading = classifier.classify(&bars, Utc::now());
        assert_eq!(reading.regime, Regime::Trend);
        assert!(reading.confidence_trend > reading.confidence_sideways);
        assert!(reading.confidence_trend > reading.confidence_volatile);
    }
}
