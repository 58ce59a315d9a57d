use crate::domain::bar::{Bar, PositionSide, Side};
use crate::domain::indicators;
use crate::domain::regime::Regime;
use crate::domain::strategy::Strategy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// RSI + Bollinger-band mean reversion. Entries fade RSI extremes confirmed
/// by a band touch; `generate_signal_with_position` additionally exits on a
/// re-touch of the middle band.
pub struct MeanReversion {
    pub period: usize,
    pub band_k: Decimal,
    pub rsi_oversold: Decimal,
    pub rsi_overbought: Decimal,
}

impl Default for MeanReversion {
    fn default() -> Self {
        Self {
            period: 20,
            band_k: dec!(2),
            rsi_oversold: dec!(30),
            rsi_overbought: dec!(70),
        }
    }
}

impl MeanReversion {
    fn entry_signal(&self, window: &[Bar]) -> Side {
        if window.len() < self.warmup_bars() {
            return Side::Hold;
        }
        let rsi = indicators::rsi(window, 14);
        let bands = indicators::bollinger(window, self.period, self.band_k);
        let close = window.last().map(|b| b.close);

        let (rsi, (upper, _middle, lower), close) = match (rsi, bands, close) {
            (Some(r), Some(b), Some(c)) => (r, b, c),
            _ => return Side::Hold,
        };

        if rsi < self.rsi_oversold && close <= lower {
            Side::Buy
        } else if rsi > self.rsi_overbought && close >= upper {
            Side::Sell
        } else {
            Side::Hold
        }
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &'static str {
        "MeanReversion"
    }

    fn generate_signal(&self, window: &[Bar]) -> Side {
        self.entry_signal(window)
    }

    fn generate_signal_with_position(
        &self,
        window: &[Bar],
        current_position: Option<PositionSide>,
    ) -> Side {
        if window.len() < self.warmup_bars() {
            return Side::Hold;
        }
        if let Some(side) = current_position {
            if let Some((_, middle, _)) = indicators::bollinger(window, self.period, self.band_k) {
                let close = window.last().map(|b| b.close).unwrap_or(Decimal::ZERO);
                match side {
                    PositionSide::Long if close >= middle => return Side::Sell,
                    PositionSide::Short if close <= middle => return Side::Buy,
                    _ => {}
                }
            }
        }
        self.entry_signal(window)
    }

    fn warmup_bars(&self) -> usize {
        self.period.max(15)
    }

    fn suitability(&self, regime: Regime) -> Decimal {
        match regime {
            Regime::Sideways => dec!(0.9),
            Regime::Volatile => dec!(0.5),
            Regime::Trend => dec!(0.3),
        }
    }
}
