use crate::domain::bar::{Bar, Side};
use crate::domain::indicators;
use crate::domain::regime::{self, Regime};
use crate::domain::strategy::Strategy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const ATR_BASELINE_LOOKBACK: usize = 50;

/// Donchian breakout confirmed by a preceding ATR contraction: a move out
/// of a tight range is treated as more significant than one out of an
/// already-wide range.
pub struct VolatilityBreakout {
    pub donchian_period: usize,
}

impl Default for VolatilityBreakout {
    fn default() -> Self {
        Self { donchian_period: 20 }
    }
}

impl Strategy for VolatilityBreakout {
    fn name(&self) -> &'static str {
        "VolatilityBreakout"
    }

    fn generate_signal(&self, window: &[Bar]) -> Side {
        if window.len() < self.warmup_bars() {
            return Side::Hold;
        }

        let current_atr = match indicators::atr(window, 14) {
            Some(v) => v,
            None => return Side::Hold,
        };
        let baseline_atr = regime::atr_median(window, ATR_BASELINE_LOOKBACK);
        let contracted = match baseline_atr {
            Some(median) => current_atr < median,
            None => false,
        };
        if !contracted {
            return Side::Hold;
        }

        let prior = &window[..window.len() - 1];
        let channel = match indicators::donchian(prior, self.donchian_period) {
            Some(v) => v,
            None => return Side::Hold,
        };
        let (upper, lower) = channel;
        let close = window.last().expect("checked len above").close;

        if close > upper {
            Side::Buy
        } else if close < lower {
            Side::Sell
        } else {
            Side::Hold
        }
    }

    fn warmup_bars(&self) -> usize {
        self.donchian_period + 1
    }

    fn suitability(&self, regime: Regime) -> Decimal {
        match regime {
            Regime::Volatile => dec!(0.9),
            Regime::Trend => dec!(0.6),
            Regime::Sideways => dec!(0.4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(high: Decimal, low: Decimal, close: Decimal) -> Bar {
        Bar {
            symbol: "TEST".to_string(),
            open_time: Utc::now().timestamp(),
            open: close,
            high,
            low,
            close,
            volume: Decimal::from(1000),
        }
    }

    #[test]
    fn holds_before_warmup() {
        let strategy = VolatilityBreakout::default();
        let bars: Vec<Bar> = (0..5).map(|_| bar(dec!(101), dec!(99), dec!(100))).collect();
        assert_eq!(strategy.generate_signal(&bars), Side::Hold);
    }

    #[test]
    fn buys_on_upside_breakout_after_contraction() {
        let strategy = VolatilityBreakout::default();
        let mut bars: Vec<Bar> = (0..60)
            .map(|_| bar(dec!(100.2), dec!(99.8), dec!(100)))
            .collect();
        bars.push(bar(dec!(103), dec!(100), dec!(103)));
        let signal = strategy.generate_signal(&bars);
        assert_eq!(signal, Side::Buy);
    }

    #[test]
    fn holds_when_not_contracted() {
        let strategy = VolatilityBreakout::default();
        let mut bars: Vec<Bar> = (0..60)
            .map(|i| {
                let base = dec!(100) + Decimal::from(i % 5);
                bar(base + dec!(3), base - dec!(3), base)
            })
            .collect();
        bars.push(bar(dec!(120), dec!(115), dec!(120)));
        let signal = strategy.generate_signal(&bars);
        assert_eq!(signal, Side::Hold);
    }
}
