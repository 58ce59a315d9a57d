use crate::domain::bar::{Bar, Side};
use crate::domain::indicators;
use crate::domain::regime::Regime;
use crate::domain::strategy::Strategy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fast/slow SMA crossover. BUY on the fast MA crossing above the slow MA,
/// SELL on the inverse cross, HOLD otherwise. An optional ATR/price cap
/// suppresses entries when volatility is too high for a trend-following
/// stop to be meaningful.
pub struct TrendFollowing {
    pub fast_period: usize,
    pub slow_period: usize,
    pub atr_price_cap: Option<Decimal>,
}

impl Default for TrendFollowing {
    fn default() -> Self {
        Self {
            fast_period: 20,
            slow_period: 50,
            atr_price_cap: None,
        }
    }
}

impl Strategy for TrendFollowing {
    fn name(&self) -> &'static str {
        "TrendFollowing"
    }

    fn generate_signal(&self, window: &[Bar]) -> Side {
        if window.len() < self.warmup_bars() {
            return Side::Hold;
        }

        let fast = indicators::sma(window, self.fast_period);
        let slow = indicators::sma(window, self.slow_period);
        let prior = &window[..window.len() - 1];
        let fast_prev = indicators::sma(prior, self.fast_period);
        let slow_prev = indicators::sma(prior, self.slow_period);

        let (fast, slow, fast_prev, slow_prev) = match (fast, slow, fast_prev, slow_prev) {
            (Some(f), Some(s), Some(fp), Some(sp)) => (f, s, fp, sp),
            _ => return Side::Hold,
        };

        if let Some(cap) = self.atr_price_cap {
            if let Some(atr) = indicators::atr(window, 14) {
                let close = window.last().map(|b| b.close).unwrap_or(Decimal::ZERO);
                if close != Decimal::ZERO && atr / close > cap {
                    return Side::Hold;
                }
            }
        }

        if fast > slow && fast_prev <= slow_prev {
            Side::Buy
        } else if fast < slow && fast_prev >= slow_prev {
            Side::Sell
        } else {
            Side::Hold
        }
    }

    fn warmup_bars(&self) -> usize {
        self.slow_period + 1
    }

    fn suitability(&self, regime: Regime) -> Decimal {
        match regime {
            Regime::Trend => dec!(0.9),
            Regime::Volatile => dec!(0.6),
            Regime::Sideways => dec!(0.3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(price: Decimal) -> Bar {
        Bar {
            symbol: "TEST".to_string(),
            open_time: Utc::now().timestamp(),
            open: price,
            high: price + dec!(1),
            low: price - dec!(1),
            close: price,
            volume: Decimal::from(1000),
        }
    }

    #[test]
    fn holds_before_warmup() {
        let strategy = TrendFollowing::default();
        let bars: Vec<Bar> = (0..10).map(|i| bar(Decimal::from(100 + i))).collect();
        assert_eq!(strategy.generate_signal(&bars), Side::Hold);
    }

    #[test]
    fn buys_on_golden_cross() {
        let strategy = TrendFollowing::default();
        let mut bars: Vec<Bar> = (0..51)
            .map(|i| bar(Decimal::from(100) - Decimal::from(i) * dec!(0.1)))
            .collect();
        // Sharp reversal at the tail so the fast MA overtakes the slow MA.
        let last = bars.last().unwrap().close;
        for i in 0..5 {
            bars.push(bar(last + Decimal::from(i + 1) * dec!(3)));
        }
        let signal = strategy.generate_signal(&bars);
        assert_eq!(signal, Side::Buy);
    }

    #[test]
    fn suitability_favors_trend_regime() {
        let strategy = TrendFollowing::default();
        assert!(strategy.suitability(Regime::Trend) > strategy.suitability(Regime::Sideways));
    }
}
