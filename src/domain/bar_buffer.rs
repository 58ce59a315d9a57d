use crate::domain::bar::{Bar, IndicatorRow};
use crate::domain::indicators;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use tracing::warn;

/// Fixed-capacity per-symbol ring of recent bars plus derived indicators.
///
/// Exclusively owned and mutated by the `AnalysisWorker` (see §5 of the
/// spec); other components only ever see a copied `snapshot()` suffix, so
/// this type does not need interior mutability or locking of its own.
pub struct BarBuffer {
    symbol: String,
    capacity: usize,
    bars: VecDeque<Bar>,
    indicators: IndicatorRow,
}

impl BarBuffer {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            capacity: capacity.max(1),
            bars: VecDeque::with_capacity(capacity),
            indicators: IndicatorRow::default(),
        }
    }

    /// Append a closed bar, replace the open (tail) bar on a partial update,
    /// or reject an out-of-order bar (logged, not raised — see spec §4.1).
    /// Returns `false` on rejection so callers can track data-integrity
    /// counters without the buffer itself raising.
    pub fn append_or_update(&mut self, bar: Bar) -> bool {
        if bar.symbol != self.symbol {
            warn!(
                symbol = %self.symbol,
                got = %bar.symbol,
                "BarBuffer: dropping bar for mismatched symbol"
            );
            return false;
        }

        match self.bars.back() {
            None => self.bars.push_back(bar),
            Some(tail) if bar.open_time == tail.open_time => {
                *self.bars.back_mut().expect("tail just matched Some") = bar;
            }
            Some(tail) if bar.open_time > tail.open_time => {
                self.bars.push_back(bar);
                if self.bars.len() > self.capacity {
                    self.bars.pop_front();
                }
            }
            Some(tail) => {
                warn!(
                    symbol = %self.symbol,
                    tail_open_time = tail.open_time,
                    got_open_time = bar.open_time,
                    "BarBuffer: rejecting out-of-order bar"
                );
                return false;
            }
        }

        self.recompute_indicators();
        true
    }

    fn recompute_indicators(&mut self) {
        let window: Vec<Bar> = self.bars.iter().cloned().collect();
        self.indicators = IndicatorRow {
            sma_20: indicators::sma(&window, 20),
            sma_50: indicators::sma(&window, 50),
            sma_200: indicators::sma(&window, 200),
            ema_12: indicators::ema(&window, 12),
            ema_26: indicators::ema(&window, 26),
            rsi_14: indicators::rsi(&window, 14),
            volatility_20: indicators::volatility(&window, 20),
            atr_14: indicators::atr(&window, 14),
            donchian_upper_20: indicators::donchian(&window, 20).map(|(u, _)| u),
            donchian_lower_20: indicators::donchian(&window, 20).map(|(_, l)| l),
            bollinger_upper_20: indicators::bollinger(&window, 20, dec!(2)).map(|(u, _, _)| u),
            bollinger_middle_20: indicators::bollinger(&window, 20, dec!(2)).map(|(_, m, _)| m),
            bollinger_lower_20: indicators::bollinger(&window, 20, dec!(2)).map(|(_, _, l)| l),
            momentum_20: indicators::momentum(&window, 20),
        };
    }

    /// Up to `n` most-recent bars, oldest first.
    pub fn snapshot(&self, n: usize) -> Vec<Bar> {
        let len = self.bars.len();
        let start = len.saturating_sub(n);
        self.bars.iter().skip(start).cloned().collect()
    }

    pub fn indicators(&self) -> &IndicatorRow {
        &self.indicators
    }

    pub fn length(&self) -> usize {
        self.bars.len()
    }

    pub fn latest_price(&self) -> Option<Decimal> {
        self.bars.back().map(|b| b.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(open_time: i64, price: i64) -> Bar {
        Bar {
            symbol: "TEST".to_string(),
            open_time,
            open: Decimal::from(price),
            high: Decimal::from(price + 1),
            low: Decimal::from(price - 1),
            close: Decimal::from(price),
            volume: Decimal::from(1000),
        }
    }

    #[test]
    fn monotonicity_is_preserved_under_mixed_updates() {
        let mut buf = BarBuffer::new("TEST", 250);
        let base = Utc::now().timestamp();
        for i in 0..10 {
            buf.append_or_update(bar(base + i, 100 + i as i64));
        }
        // partial update of the tail
        buf.append_or_update(bar(base + 9, 150));
        // out-of-order bar rejected
        buf.append_or_update(bar(base + 3, 999));

        let snapshot = buf.snapshot(100);
        for pair in snapshot.windows(2) {
            assert!(pair[0].open_time < pair[1].open_time);
        }
        assert_eq!(buf.length(), 10);
        assert_eq!(buf.latest_price(), Some(Decimal::from(150)));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut buf = BarBuffer::new("TEST", 5);
        let base = Utc::now().timestamp();
        for i in 0..10 {
            buf.append_or_update(bar(base + i, 100 + i as i64));
        }
        assert_eq!(buf.length(), 5);
        let snapshot = buf.snapshot(100);
        assert_eq!(snapshot.first().unwrap().open_time, base + 5);
    }

    #[test]
    fn indicators_unavailable_before_warmup() {
        let mut buf = BarBuffer::new("TEST", 250);
        let base = Utc::now().timestamp();
        for i in 0..5 {
            buf.append_or_update(bar(base + i, 100 + i as i64));
        }
        assert!(buf.indicators().sma_20.is_none());
        assert!(buf.indicators().rsi_14.is_none());
    }
}
