use crate::domain::bar::{Bar, PositionSide, Side};
use crate::domain::regime::Regime;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub side: Side,
    pub generated_at: DateTime<Utc>,
    pub symbol: String,
    pub reference_price: Decimal,
    pub strategy_name: String,
    pub regime_at_generation: Regime,
}

/// A signal-generating rule with a static suitability over regimes.
///
/// No inheritance chain: each strategy is an independent value implementing
/// this narrow capability set.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produces a side from the bar window; `HOLD` while indicators are
    /// still warming up.
    fn generate_signal(&self, window: &[Bar]) -> Side;

    fn warmup_bars(&self) -> usize;

    /// Static per-regime suitability in `[0, 1]`.
    fn suitability(&self, regime: Regime) -> Decimal;

    /// `generate_signal` plus awareness of an open position, for strategies
    /// whose rule depends on it (e.g. mean-reversion's middle-band
    /// re-touch exit). Defaults to the position-agnostic rule.
    fn generate_signal_with_position(
        &self,
        window: &[Bar],
        current_position: Option<PositionSide>,
    ) -> Side {
        let _ = current_position;
        self.generate_signal(window)
    }
}
