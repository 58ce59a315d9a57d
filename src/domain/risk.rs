use crate::domain::account::{AccountSnapshot, Position, RiskConfig, StopLossMethod};
use crate::domain::bar::Side;
use crate::domain::errors::RiskReject;
use crate::domain::strategy::Signal;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Recommended scaling factor applied on top of the sized quantity.
    pub fn scaling_factor(self) -> Decimal {
        match self {
            RiskLevel::Low => Decimal::ONE,
            RiskLevel::Medium => dec!(0.75),
            RiskLevel::High => dec!(0.5),
            RiskLevel::Critical => dec!(0.25),
        }
    }

    fn from_score(score: Decimal) -> Self {
        if score <= dec!(25) {
            RiskLevel::Low
        } else if score <= dec!(50) {
            RiskLevel::Medium
        } else if score <= dec!(75) {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlan {
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub risk_score: Decimal,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSummary {
    pub concentration_fraction: Decimal,
    pub portfolio_risk_fraction: Decimal,
}

/// Position sizing, trade validation, stop-loss/take-profit derivation,
/// and portfolio-level risk summary.
#[derive(Default)]
pub struct RiskManager;

impl RiskManager {
    pub fn new() -> Self {
        Self
    }

    pub fn derive_stop_loss(&self, entry: Decimal, atr: Option<Decimal>, side: Side, config: &RiskConfig) -> Decimal {
        match config.sl_method {
            StopLossMethod::Percent => {
                let p = dec!(0.02);
                match side {
                    Side::Buy => entry * (Decimal::ONE - p),
                    Side::Sell => entry * (Decimal::ONE + p),
                    Side::Hold => entry,
                }
            }
            StopLossMethod::Atr => {
                let k = dec!(2);
                let atr = atr.unwrap_or(entry * dec!(0.01));
                match side {
                    Side::Buy => entry - k * atr,
                    Side::Sell => entry + k * atr,
                    Side::Hold => entry,
                }
            }
            StopLossMethod::Fixed => {
                let offset = dec!(1);
                match side {
                    Side::Buy => entry - offset,
                    Side::Sell => entry + offset,
                    Side::Hold => entry,
                }
            }
        }
    }

    pub fn derive_take_profit(&self, entry: Decimal, stop: Decimal, side: Side, rr: Decimal) -> Decimal {
        let risk = (entry - stop).abs();
        match side {
            Side::Buy => entry + rr * risk,
            Side::Sell => entry - rr * risk,
            Side::Hold => entry,
        }
    }

    pub fn portfolio_risk(&self, account: &AccountSnapshot, _open_positions: &[Position]) -> RiskSummary {
        let invested = account.portfolio_value - account.cash;
        let concentration_fraction = if account.portfolio_value == Decimal::ZERO {
            Decimal::ZERO
        } else {
            (invested / account.portfolio_value).max(Decimal::ZERO)
        };
        RiskSummary {
            concentration_fraction,
            portfolio_risk_fraction: concentration_fraction,
        }
    }

    pub fn size_and_validate(
        &self,
        signal: &Signal,
        account: &AccountSnapshot,
        risk_config: &RiskConfig,
        stop_loss_price: Decimal,
        atr: Option<Decimal>,
    ) -> Result<OrderPlan, RiskReject> {
        let entry = signal.reference_price;
        let stop_distance = (entry - stop_loss_price).abs();
        if stop_distance == Decimal::ZERO {
            return Err(RiskReject::ZeroQuantity);
        }

        let capital = risk_config.capital;
        let raw_qty = (capital * risk_config.risk_per_trade_fraction) / stop_distance;
        let mut qty = raw_qty.floor();

        let max_notional = risk_config.max_position_fraction * capital;
        if qty * entry > max_notional && entry != Decimal::ZERO {
            qty = (max_notional / entry).floor();
        }
        if qty * entry > account.buying_power && entry != Decimal::ZERO {
            qty = (account.buying_power / entry).floor();
        }

        if qty <= Decimal::ZERO {
            return Err(RiskReject::ZeroQuantity);
        }

        let notional = qty * entry;
        if notional > account.buying_power {
            return Err(RiskReject::InsufficientBuyingPower {
                needed: notional.to_string(),
                available: account.buying_power.to_string(),
            });
        }

        let invested = account.portfolio_value - account.cash;
        let projected_concentration = if account.portfolio_value == Decimal::ZERO {
            Decimal::ZERO
        } else {
            (invested + notional) / account.portfolio_value
        };
        let concentration_cap = Decimal::ONE - risk_config.cash_floor;
        if projected_concentration > concentration_cap {
            return Err(RiskReject::ConcentrationExceeded {
                projected: projected_concentration.to_string(),
                cap: concentration_cap.to_string(),
            });
        }

        let summary = self.portfolio_risk(account, &account.open_positions);
        if summary.portfolio_risk_fraction > risk_config.max_portfolio_risk_fraction {
            return Err(RiskReject::PortfolioRiskExceeded {
                drawdown: summary.portfolio_risk_fraction.to_string(),
                max: risk_config.max_portfolio_risk_fraction.to_string(),
            });
        }

        let take_profit = self.derive_take_profit(entry, stop_loss_price, signal.side, risk_config.reward_risk_ratio);
        let (risk_score, risk_level) = self.entry_risk_score(entry, stop_distance, atr);

        let scaled_qty = (qty * risk_level.scaling_factor()).floor();
        if scaled_qty <= Decimal::ZERO {
            return Err(RiskReject::ZeroQuantity);
        }

        Ok(OrderPlan {
            symbol: signal.symbol.clone(),
            side: signal.side,
            qty: scaled_qty,
            entry_price: entry,
            stop_loss: stop_loss_price,
            take_profit,
            risk_score,
            risk_level,
        })
    }

    /// Entry-risk score in `[0, 100]`: a weighted blend of normalized stop
    /// distance, ATR/price volatility, and ATR itself as a volatility-context
    /// proxy (regime volatility context is folded in by the caller passing
    /// the symbol's current ATR14).
    fn entry_risk_score(&self, entry: Decimal, stop_distance: Decimal, atr: Option<Decimal>) -> (Decimal, RiskLevel) {
        if entry == Decimal::ZERO {
            return (Decimal::ZERO, RiskLevel::Low);
        }
        let stop_component = clamp01(stop_distance / entry) * dec!(100);
        let atr_component = match atr {
            Some(a) => clamp01(a / entry) * dec!(100),
            None => Decimal::ZERO,
        };
        let regime_component = atr_component;

        let score = dec!(0.4) * stop_component + dec!(0.3) * atr_component + dec!(0.3) * regime_component;
        let score = score.max(Decimal::ZERO).min(dec!(100));
        (score, RiskLevel::from_score(score))
    }
}

fn clamp01(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::regime::Regime;
    use chrono::Utc;

    fn signal(price: Decimal) -> Signal {
        Signal {
            side: Side::Buy,
            generated_at: Utc::now(),
            symbol: "TEST".to_string(),
            reference_price: price,
            strategy_name: "TrendFollowing".to_string(),
            regime_at_generation: Regime::Trend,
        }
    }

    fn account(cash: Decimal, buying_power: Decimal, portfolio_value: Decimal) -> AccountSnapshot {
        AccountSnapshot {
            portfolio_value,
            cash,
            buying_power,
            open_positions: vec![],
        }
    }

    #[test]
    fn sizing_respects_risk_per_trade_fraction() {
        let manager = RiskManager::new();
        let config = RiskConfig {
            capital: Decimal::from(1000),
            risk_per_trade_fraction: dec!(0.02),
            max_position_fraction: dec!(1.0),
            ..RiskConfig::default()
        };
        let acct = account(Decimal::from(1000), Decimal::from(1000), Decimal::from(1000));
        let plan = manager
            .size_and_validate(&signal(Decimal::from(100)), &acct, &config, Decimal::from(99), None)
            .unwrap();
        assert!(plan.qty * plan.entry_price <= config.max_position_fraction * config.capital);
        assert!(plan.qty * (plan.entry_price - plan.stop_loss).abs() <= config.capital * config.risk_per_trade_fraction);
    }

    #[test]
    fn zero_stop_distance_is_rejected() {
        let manager = RiskManager::new();
        let config = RiskConfig::default();
        let acct = account(Decimal::from(1000), Decimal::from(1000), Decimal::from(1000));
        let result = manager.size_and_validate(&signal(Decimal::from(100)), &acct, &config, Decimal::from(100), None);
        assert_eq!(result.unwrap_err(), RiskReject::ZeroQuantity);
    }

    #[test]
    fn insufficient_buying_power_is_rejected() {
        let manager = RiskManager::new();
        let config = RiskConfig {
            capital: Decimal::from(100_000),
            risk_per_trade_fraction: dec!(0.05),
            max_position_fraction: dec!(1.0),
            ..RiskConfig::default()
        };
        let acct = account(Decimal::from(10), Decimal::from(10), Decimal::from(10));
        let result = manager.size_and_validate(&signal(Decimal::from(100)), &acct, &config, Decimal::from(99), None);
        assert!(result.is_err());
    }

    #[test]
    fn risk_score_within_bounds() {
        let manager = RiskManager::new();
        let (score, _level) = manager.entry_risk_score(Decimal::from(100), Decimal::from(5), Some(Decimal::from(2)));
        assert!(score >= Decimal::ZERO && score <= dec!(100));
    }
}
