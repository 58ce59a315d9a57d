use crate::domain::account::Trade;
use crate::domain::regime::Regime;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TRADE_WINDOW: usize = 50;
pub const DEFAULT_EQUITY_WINDOW: usize = 60;
const MIN_SAMPLES: usize = 5;
const DEFAULT_DAILY_K: f64 = 15.874_507_866_387_544; // sqrt(252)
const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyHealth {
    Excellent,
    Good,
    Degrading,
    Poor,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquitySample {
    pub at: DateTime<Utc>,
    pub portfolio_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceWindow {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquitySample>,
    pub sharpe: Decimal,
    pub max_drawdown: Decimal,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
    pub total_return: Decimal,
    pub state: StrategyHealth,
}

/// Records realized trade outcomes and equity samples; reports rolling
/// risk-adjusted metrics and a strategy health classification.
///
/// Single-writer (the `ExecutionWorker`), multi-reader (`AnalysisWorker`,
/// `ControlWorker` via the snapshot protocol) — see the concurrency model.
#[derive(Default)]
pub struct PerformanceMonitor {
    trades: Vec<Trade>,
    equity_curve: Vec<EquitySample>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn record_equity(&mut self, at: DateTime<Utc>, portfolio_value: Decimal) {
        self.equity_curve.push(EquitySample { at, portfolio_value });
    }

    pub fn metrics(&self, window_size: usize) -> PerformanceWindow {
        self.metrics_for(&self.trades, window_size)
    }

    pub fn state(&self, window_size: usize) -> StrategyHealth {
        self.metrics(window_size).state
    }

    /// Rolling Sharpe restricted to `strategy_name`'s trades entered while
    /// `regime` was active; `None` when there are no matching samples. Feeds
    /// `StrategySelector`'s `performance_bias`.
    pub fn sharpe_for(&self, strategy_name: &str, regime: Regime, window_size: usize) -> Option<Decimal> {
        let filtered: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| t.strategy_name == strategy_name && t.regime_at_entry == regime)
            .cloned()
            .collect();
        if filtered.is_empty() {
            return None;
        }
        let window = tail(&filtered, window_size);
        Some(sharpe_of(&window))
    }

    /// `metrics`, restricted to one strategy's trades. Used by the
    /// selector's switch protocol to read a strategy's own health
    /// independent of the others sharing the account.
    pub fn metrics_for_strategy(&self, strategy_name: &str, window_size: usize) -> PerformanceWindow {
        let filtered: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| t.strategy_name == strategy_name)
            .cloned()
            .collect();
        self.metrics_for(&filtered, window_size)
    }

    fn metrics_for(&self, trades: &[Trade], window_size: usize) -> PerformanceWindow {
        let trade_window: Vec<Trade> = tail(trades, window_size.max(1));
        let equity_window: Vec<EquitySample> = tail(&self.equity_curve, DEFAULT_EQUITY_WINDOW);

        if trade_window.len() < MIN_SAMPLES {
            return PerformanceWindow {
                trades: trade_window,
                equity_curve: equity_window,
                sharpe: Decimal::ZERO,
                max_drawdown: Decimal::ZERO,
                win_rate: Decimal::ZERO,
                profit_factor: Decimal::ZERO,
                total_return: Decimal::ZERO,
                state: StrategyHealth::InsufficientData,
            };
        }

        let sharpe = sharpe_of(&trade_window);
        let max_drawdown = max_drawdown_of(&equity_window);
        let win_rate = win_rate_of(&trade_window);
        let profit_factor = profit_factor_of(&trade_window);
        let total_return = total_return_of(&trade_window);
        let state = classify(sharpe, max_drawdown);

        PerformanceWindow {
            trades: trade_window,
            equity_curve: equity_window,
            sharpe,
            max_drawdown,
            win_rate,
            profit_factor,
            total_return,
            state,
        }
    }
}

fn tail<T: Clone>(items: &[T], window_size: usize) -> Vec<T> {
    let start = items.len().saturating_sub(window_size);
    items[start..].to_vec()
}

fn trade_return(trade: &Trade) -> Decimal {
    let capital_at_entry = trade.entry_price * trade.qty;
    if capital_at_entry == Decimal::ZERO {
        return Decimal::ZERO;
    }
    trade.realized_pnl / capital_at_entry
}

fn annualization_factor(trades: &[Trade]) -> Decimal {
    if trades.len() < 2 {
        return Decimal::from_f64(DEFAULT_DAILY_K).unwrap_or(Decimal::ONE);
    }
    let first = trades.first().unwrap().closed_at;
    let last = trades.last().unwrap().closed_at;
    let span_seconds = (last - first).num_seconds() as f64;
    if span_seconds <= 0.0 {
        return Decimal::from_f64(DEFAULT_DAILY_K).unwrap_or(Decimal::ONE);
    }
    let avg_interval = span_seconds / (trades.len() as f64 - 1.0);
    if avg_interval <= 0.0 {
        return Decimal::from_f64(DEFAULT_DAILY_K).unwrap_or(Decimal::ONE);
    }
    let periods_per_year = SECONDS_PER_YEAR / avg_interval;
    Decimal::from_f64(periods_per_year.sqrt()).unwrap_or(Decimal::ONE)
}

fn sharpe_of(trades: &[Trade]) -> Decimal {
    if trades.len() < 2 {
        return Decimal::ZERO;
    }
    let returns: Vec<Decimal> = trades.iter().map(trade_return).collect();
    let n = Decimal::from(returns.len() as u64);
    let mean: Decimal = returns.iter().sum::<Decimal>() / n;
    let variance: Decimal = returns.iter().map(|r| (*r - mean) * (*r - mean)).sum::<Decimal>() / n;
    let stddev = decimal_sqrt(variance);
    if stddev == Decimal::ZERO {
        return Decimal::ZERO;
    }
    let k = annualization_factor(trades);
    (mean / stddev) * k
}

fn max_drawdown_of(equity_curve: &[EquitySample]) -> Decimal {
    if equity_curve.is_empty() {
        return Decimal::ZERO;
    }
    let mut peak = equity_curve[0].portfolio_value;
    let mut worst = Decimal::ZERO;
    for sample in equity_curve {
        if sample.portfolio_value > peak {
            peak = sample.portfolio_value;
        }
        if peak != Decimal::ZERO {
            let drawdown = (peak - sample.portfolio_value) / peak;
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst
}

fn win_rate_of(trades: &[Trade]) -> Decimal {
    let wins = trades.iter().filter(|t| t.realized_pnl > Decimal::ZERO).count();
    Decimal::from(wins as u64) / Decimal::from(trades.len() as u64)
}

fn profit_factor_of(trades: &[Trade]) -> Decimal {
    let gains: Decimal = trades.iter().filter(|t| t.realized_pnl > Decimal::ZERO).map(|t| t.realized_pnl).sum();
    let losses: Decimal = trades
        .iter()
        .filter(|t| t.realized_pnl < Decimal::ZERO)
        .map(|t| -t.realized_pnl)
        .sum();
    if losses == Decimal::ZERO {
        if gains == Decimal::ZERO {
            Decimal::ZERO
        } else {
            Decimal::MAX
        }
    } else {
        gains / losses
    }
}

fn total_return_of(trades: &[Trade]) -> Decimal {
    trades.iter().map(trade_return).sum()
}

fn classify(sharpe: Decimal, max_drawdown: Decimal) -> StrategyHealth {
    // Ties resolve to the worst matching bucket, so evaluate POOR first.
    if sharpe < Decimal::ZERO || max_drawdown > dec!(0.30) {
        return StrategyHealth::Poor;
    }
    if sharpe < Decimal::ONE || max_drawdown > dec!(0.20) {
        return StrategyHealth::Degrading;
    }
    if sharpe > dec!(2.0) && max_drawdown < dec!(0.10) {
        return StrategyHealth::Excellent;
    }
    if sharpe > Decimal::ONE && max_drawdown < dec!(0.20) {
        return StrategyHealth::Good;
    }
    StrategyHealth::Degrading
}

fn decimal_sqrt(value: Decimal) -> Decimal {
    let f = value.to_f64().unwrap_or(0.0).max(0.0);
    Decimal::from_f64(f.sqrt()).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::PositionSide;
    use chrono::Duration as ChronoDuration;

    fn trade(pnl: Decimal, closed_at: DateTime<Utc>) -> Trade {
        Trade {
            symbol: "TEST".to_string(),
            side: PositionSide::Long,
            qty: Decimal::from(10),
            entry_price: Decimal::from(100),
            exit_price: Decimal::from(100) + pnl / Decimal::from(10),
            opened_at: closed_at - ChronoDuration::hours(1),
            closed_at,
            realized_pnl: pnl,
            strategy_name: "TrendFollowing".to_string(),
            regime_at_entry: Regime::Trend,
        }
    }

    #[test]
    fn fewer_than_five_trades_is_insufficient_data() {
        let mut monitor = PerformanceMonitor::new();
        let now = Utc::now();
        for i in 0..3 {
            monitor.record_trade(trade(Decimal::from(10), now + ChronoDuration::hours(i)));
        }
        assert_eq!(monitor.state(DEFAULT_TRADE_WINDOW), StrategyHealth::InsufficientData);
    }

    #[test]
    fn all_winning_trades_yields_high_health() {
        let mut monitor = PerformanceMonitor::new();
        let now = Utc::now();
        for i in 0..10 {
            monitor.record_trade(trade(Decimal::from(50), now + ChronoDuration::hours(i)));
        }
        let metrics = monitor.metrics(DEFAULT_TRADE_WINDOW);
        assert_eq!(metrics.win_rate, Decimal::ONE);
        assert_eq!(metrics.profit_factor, Decimal::MAX);
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        let mut monitor = PerformanceMonitor::new();
        let now = Utc::now();
        monitor.record_equity(now, Decimal::from(1000));
        monitor.record_equity(now + ChronoDuration::hours(1), Decimal::from(1200));
        monitor.record_equity(now + ChronoDuration::hours(2), Decimal::from(900));
        let metrics = monitor.metrics(DEFAULT_TRADE_WINDOW);
        assert_eq!(metrics.max_drawdown, dec!(0.25));
    }

    #[test]
    fn mixed_wins_and_losses_computes_profit_factor() {
        let mut monitor = PerformanceMonitor::new();
        let now = Utc::now();
        let pnls = [20, -10, 30, -5, 15, -20, 25];
        for (i, pnl) in pnls.iter().enumerate() {
            monitor.record_trade(trade(Decimal::from(*pnl), now + ChronoDuration::hours(i as i64)));
        }
        let metrics = monitor.metrics(DEFAULT_TRADE_WINDOW);
        assert!(metrics.profit_factor > Decimal::ZERO);
        assert!(metrics.win_rate > Decimal::ZERO && metrics.win_rate < Decimal::ONE);
    }
}
