//! Pure indicator functions over an ordered bar window.
//!
//! Every function takes the most-recent-last slice of `Bar`s it needs and
//! returns `None` when the window is shorter than the indicator's warm-up
//! length, rather than a sentinel value.

use crate::domain::bar::Bar;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

fn closes(bars: &[Bar]) -> Vec<Decimal> {
    bars.iter().map(|b| b.close).collect()
}

/// Simple moving average of the last `n` closes.
pub fn sma(bars: &[Bar], n: usize) -> Option<Decimal> {
    if bars.len() < n || n == 0 {
        return None;
    }
    let window = &bars[bars.len() - n..];
    let sum: Decimal = window.iter().map(|b| b.close).sum();
    Some(sum / Decimal::from(n))
}

/// Exponential moving average, seeded with SMA(n) at warm-up.
///
/// Recomputed in full from the window each call (batch formula); callers
/// that want incremental updates may cache the prior EMA and apply the
/// recurrence themselves — the value is defined to match this function.
pub fn ema(bars: &[Bar], n: usize) -> Option<Decimal> {
    if bars.len() < n || n == 0 {
        return None;
    }
    let alpha = Decimal::from(2) / Decimal::from(n as u64 + 1);
    let seed: Decimal = bars[..n].iter().map(|b| b.close).sum::<Decimal>() / Decimal::from(n);
    let mut value = seed;
    for bar in &bars[n..] {
        value = alpha * bar.close + (Decimal::ONE - alpha) * value;
    }
    Some(value)
}

/// Wilder-smoothed RSI over `n` periods (default 14).
///
/// Seeded with the simple average of the first `n` gain/loss samples, then
/// carried forward with Wilder's recursive average
/// (`avg = (avg * (n - 1) + new) / n`) over the rest of the window.
pub fn rsi(bars: &[Bar], n: usize) -> Option<Decimal> {
    if bars.len() < n + 1 || n == 0 {
        return None;
    }
    let mut avg_gain = Decimal::ZERO;
    let mut avg_loss = Decimal::ZERO;
    for pair in bars[..=n].windows(2) {
        let change = pair[1].close - pair[0].close;
        if change > Decimal::ZERO {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= Decimal::from(n);
    avg_loss /= Decimal::from(n);
    for pair in bars[n..].windows(2) {
        let change = pair[1].close - pair[0].close;
        let (gain, loss) = if change > Decimal::ZERO { (change, Decimal::ZERO) } else { (Decimal::ZERO, -change) };
        avg_gain = (avg_gain * Decimal::from(n - 1) + gain) / Decimal::from(n);
        avg_loss = (avg_loss * Decimal::from(n - 1) + loss) / Decimal::from(n);
    }
    if avg_loss == Decimal::ZERO {
        return Some(Decimal::from(100));
    }
    let rs = avg_gain / avg_loss;
    Some(Decimal::from(100) - Decimal::from(100) / (Decimal::ONE + rs))
}

fn true_range(prev_close: Decimal, high: Decimal, low: Decimal) -> Decimal {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Wilder-smoothed Average True Range over `n` periods (default 14).
///
/// Same seed-then-recur shape as [`rsi`]: simple average of the first `n`
/// true-range samples, then Wilder's recursive average over the rest.
pub fn atr(bars: &[Bar], n: usize) -> Option<Decimal> {
    if bars.len() < n + 1 || n == 0 {
        return None;
    }
    let mut avg = Decimal::ZERO;
    for pair in bars[..=n].windows(2) {
        avg += true_range(pair[0].close, pair[1].high, pair[1].low);
    }
    avg /= Decimal::from(n);
    for pair in bars[n..].windows(2) {
        let tr = true_range(pair[0].close, pair[1].high, pair[1].low);
        avg = (avg * Decimal::from(n - 1) + tr) / Decimal::from(n);
    }
    Some(avg)
}

/// Standard deviation of simple returns over the last `n` bars.
pub fn volatility(bars: &[Bar], n: usize) -> Option<Decimal> {
    if bars.len() < n + 1 || n == 0 {
        return None;
    }
    let window = &bars[bars.len() - (n + 1)..];
    let returns: Vec<Decimal> = window
        .windows(2)
        .map(|pair| {
            if pair[0].close == Decimal::ZERO {
                Decimal::ZERO
            } else {
                (pair[1].close - pair[0].close) / pair[0].close
            }
        })
        .collect();
    let mean: Decimal = returns.iter().sum::<Decimal>() / Decimal::from(returns.len() as u64);
    let variance: Decimal = returns
        .iter()
        .map(|r| (*r - mean) * (*r - mean))
        .sum::<Decimal>()
        / Decimal::from(returns.len() as u64);
    decimal_sqrt(variance)
}

/// Momentum / rate of change over `n` bars: `close_t / close_{t-n} - 1`.
pub fn momentum(bars: &[Bar], n: usize) -> Option<Decimal> {
    if bars.len() < n + 1 || n == 0 {
        return None;
    }
    let last = bars.last()?.close;
    let prior = bars[bars.len() - 1 - n].close;
    if prior == Decimal::ZERO {
        return None;
    }
    Some(last / prior - Decimal::ONE)
}

/// Donchian channel: (upper, lower) over the last `n` bars.
pub fn donchian(bars: &[Bar], n: usize) -> Option<(Decimal, Decimal)> {
    if bars.len() < n || n == 0 {
        return None;
    }
    let window = &bars[bars.len() - n..];
    let upper = window
        .iter()
        .map(|b| b.high)
        .fold(Decimal::MIN, Decimal::max);
    let lower = window
        .iter()
        .map(|b| b.low)
        .fold(Decimal::MAX, Decimal::min);
    Some((upper, lower))
}

/// Bollinger bands: (upper, middle, lower) = SMA(n) +/- k * stddev(n) of closes.
pub fn bollinger(bars: &[Bar], n: usize, k: Decimal) -> Option<(Decimal, Decimal, Decimal)> {
    if bars.len() < n || n == 0 {
        return None;
    }
    let window = &bars[bars.len() - n..];
    let closes = closes(window);
    let middle: Decimal = closes.iter().sum::<Decimal>() / Decimal::from(n);
    let variance: Decimal =
        closes.iter().map(|c| (*c - middle) * (*c - middle)).sum::<Decimal>() / Decimal::from(n);
    let stddev = decimal_sqrt(variance)?;
    Some((middle + k * stddev, middle, middle - k * stddev))
}

/// `Decimal` has no native sqrt; Newton's method via `f64` round-trip is
/// accurate enough for volatility/band widths, which are display/scoring
/// quantities rather than settlement amounts.
fn decimal_sqrt(value: Decimal) -> Option<Decimal> {
    use rust_decimal::prelude::ToPrimitive;
    let f = value.to_f64()?;
    if f < 0.0 {
        return None;
    }
    Decimal::from_f64(f.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(price: f64) -> Bar {
        Bar {
            symbol: "TEST".to_string(),
            open_time: Utc::now().timestamp(),
            open: Decimal::from_f64(price).unwrap(),
            high: Decimal::from_f64(price + 1.0).unwrap(),
            low: Decimal::from_f64(price - 1.0).unwrap(),
            close: Decimal::from_f64(price).unwrap(),
            volume: Decimal::from(1000),
        }
    }

    #[test]
    fn sma_requires_full_window() {
        let bars: Vec<Bar> = (0..5).map(|i| bar(100.0 + i as f64)).collect();
        assert!(sma(&bars, 10).is_none());
        assert!(sma(&bars, 5).is_some());
    }

    #[test]
    fn sma_flat_series_equals_price() {
        let bars: Vec<Bar> = (0..20).map(|_| bar(100.0)).collect();
        assert_eq!(sma(&bars, 20).unwrap(), Decimal::from(100));
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let bars: Vec<Bar> = (0..20).map(|i| bar(100.0 + i as f64)).collect();
        let value = rsi(&bars, 14).unwrap();
        assert_eq!(value, Decimal::from(100));
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let bars: Vec<Bar> = (0..20).map(|i| bar(200.0 - i as f64)).collect();
        let value = rsi(&bars, 14).unwrap();
        assert_eq!(value, Decimal::ZERO);
    }

    #[test]
    fn momentum_matches_formula() {
        let bars: Vec<Bar> = vec![bar(100.0), bar(105.0), bar(110.0)];
        let m = momentum(&bars, 2).unwrap();
        assert_eq!(m, Decimal::from_f64(0.1).unwrap());
    }

    #[test]
    fn donchian_tracks_window_extremes() {
        let bars: Vec<Bar> = (0..20).map(|i| bar(100.0 + i as f64)).collect();
        let (upper, lower) = donchian(&bars, 20).unwrap();
        assert!(upper > lower);
    }

    #[test]
    fn bollinger_bands_straddle_middle() {
        let bars: Vec<Bar> = (0..20).map(|i| bar(100.0 + (i as f64 % 3.0))).collect();
        let (upper, middle, lower) = bollinger(&bars, 20, Decimal::from(2)).unwrap();
        assert!(upper >= middle);
        assert!(middle >= lower);
    }

    #[test]
    fn atr_zero_range_is_zero() {
        let bars: Vec<Bar> = (0..20)
            .map(|_| Bar {
                symbol: "TEST".to_string(),
                open_time: Utc::now().timestamp(),
                open: Decimal::from(100),
                high: Decimal::from(100),
                low: Decimal::from(100),
                close: Decimal::from(100),
                volume: Decimal::from(1000),
            })
            .collect();
        assert_eq!(atr(&bars, 14).unwrap(), Decimal::ZERO);
    }
}
