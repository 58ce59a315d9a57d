use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV candle at the engine's configured timeframe.
///
/// Immutable once constructed; `BarBuffer` decides whether a new `Bar`
/// replaces the tail (partial-bar update) or appends (bar close).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
            Side::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// Derived scalars aligned with the most recent bar in a `BarBuffer`.
///
/// Values before an indicator's warm-up length are `None` rather than a
/// sentinel NaN, so strategies must check availability before reading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub sma_20: Option<Decimal>,
    pub sma_50: Option<Decimal>,
    pub sma_200: Option<Decimal>,
    pub ema_12: Option<Decimal>,
    pub ema_26: Option<Decimal>,
    pub rsi_14: Option<Decimal>,
    pub volatility_20: Option<Decimal>,
    pub atr_14: Option<Decimal>,
    pub donchian_upper_20: Option<Decimal>,
    pub donchian_lower_20: Option<Decimal>,
    pub bollinger_upper_20: Option<Decimal>,
    pub bollinger_middle_20: Option<Decimal>,
    pub bollinger_lower_20: Option<Decimal>,
    pub momentum_20: Option<Decimal>,
}
