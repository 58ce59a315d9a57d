use crate::domain::bar::PositionSide;
use crate::domain::regime::Regime;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: PositionSide,
    pub qty: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub realized_pnl: Decimal,
    pub strategy_name: String,
    pub regime_at_entry: Regime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub portfolio_value: Decimal,
    pub cash: Decimal,
    pub buying_power: Decimal,
    pub open_positions: Vec<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopLossMethod {
    Percent,
    Atr,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub capital: Decimal,
    pub risk_per_trade_fraction: Decimal,
    pub max_position_fraction: Decimal,
    pub max_portfolio_risk_fraction: Decimal,
    pub reward_risk_ratio: Decimal,
    pub sl_method: StopLossMethod,
    pub cash_floor: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            capital: Decimal::from(100_000),
            risk_per_trade_fraction: dec!(0.01),
            max_position_fraction: dec!(0.25),
            max_portfolio_risk_fraction: dec!(0.5),
            reward_risk_ratio: dec!(2),
            sl_method: StopLossMethod::Atr,
            cash_floor: dec!(0.05),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineMode {
    Paper,
    Live,
    Mock,
}
