use crate::domain::performance::StrategyHealth;
use crate::domain::regime::{Regime, RegimeReading};
use crate::domain::strategy::Strategy;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchReason {
    ScoreImprovement,
    PerformanceDegrading,
    RegimeChange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchEvent {
    pub from: String,
    pub to: String,
    pub reason: SwitchReason,
    pub regime: Regime,
    pub at: DateTime<Utc>,
}

/// Normalizes a rolling Sharpe into the `[-1, 1]` band `performance_bias`
/// expects. Sharpe itself is unbounded, so this squashes via a fixed
/// divisor rather than claiming a statistical mapping.
pub fn performance_bias(sharpe: Option<Decimal>) -> Decimal {
    match sharpe {
        None => Decimal::ZERO,
        Some(s) => (s / dec!(2)).max(dec!(-1)).min(dec!(1)),
    }
}

/// Meta-policy that picks the active strategy for the current regime and
/// recent performance, subject to a hysteresis-gated switch protocol.
///
/// Stateless between calls except for the current strategy name, the last
/// observed regime, and the degrading-health streak counter — callers own
/// the rest (regime readings, strategies, performance bias) and pass them
/// in fresh each time.
pub struct StrategySelector {
    lambda: Decimal,
    hysteresis: Decimal,
    current: Option<String>,
    last_regime: Option<Regime>,
    degrading_streak: u32,
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new(dec!(0.2), dec!(0.1))
    }
}

impl StrategySelector {
    pub fn new(lambda: Decimal, hysteresis: Decimal) -> Self {
        Self {
            lambda,
            hysteresis,
            current: None,
            last_regime: None,
            degrading_streak: 0,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn select(
        &mut self,
        regime_reading: &RegimeReading,
        strategies: &[Arc<dyn Strategy>],
        performance_bias: &HashMap<String, Decimal>,
        current_health: StrategyHealth,
        now: DateTime<Utc>,
    ) -> (String, Option<SwitchEvent>) {
        let scores: Vec<(String, Decimal)> = strategies
            .iter()
            .map(|s| {
                let bias = performance_bias.get(s.name()).copied().unwrap_or(Decimal::ZERO);
                let score = s.suitability(regime_reading.regime) * regime_reading.confidence_of(regime_reading.regime)
                    + self.lambda * bias;
                (s.name().to_string(), score)
            })
            .collect();

        let (best_name, best_score) = scores
            .iter()
            .cloned()
            .fold(None, |acc: Option<(String, Decimal)>, (name, score)| match acc {
                Some((_, best)) if best >= score => acc,
                _ => Some((name, score)),
            })
            .expect("strategy set is never empty");

        let Some(current_name) = self.current.clone() else {
            self.current = Some(best_name.clone());
            self.last_regime = Some(regime_reading.regime);
            return (best_name, None);
        };

        let regime_changed = self.last_regime != Some(regime_reading.regime);
        let current_score = scores
            .iter()
            .find(|(name, _)| *name == current_name)
            .map(|(_, s)| *s)
            .unwrap_or(Decimal::ZERO);

        let mut switch_reason = None;

        if best_name != current_name {
            if best_score - current_score >= self.hysteresis {
                switch_reason = Some(SwitchReason::ScoreImprovement);
            } else if matches!(current_health, StrategyHealth::Degrading | StrategyHealth::Poor) {
                if self.degrading_streak >= 1 {
                    switch_reason = Some(SwitchReason::PerformanceDegrading);
                }
            } else if regime_changed {
                if let Some(current_strategy) = strategies.iter().find(|s| s.name() == current_name) {
                    if current_strategy.suitability(regime_reading.regime) < dec!(0.5) {
                        switch_reason = Some(SwitchReason::RegimeChange);
                    }
                }
            }
        }

        if matches!(current_health, StrategyHealth::Degrading | StrategyHealth::Poor) {
            self.degrading_streak += 1;
        } else {
            self.degrading_streak = 0;
        }

        self.last_regime = Some(regime_reading.regime);

        let switch_event = switch_reason.map(|reason| {
            self.degrading_streak = 0;
            SwitchEvent {
                from: current_name.clone(),
                to: best_name.clone(),
                reason,
                regime: regime_reading.regime,
                at: now,
            }
        });

        let active = if switch_event.is_some() { best_name } else { current_name };
        self.current = Some(active.clone());
        (active, switch_event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategies::default_strategy_set;

    fn reading(regime: Regime, confidence: Decimal) -> RegimeReading {
        let rest = (Decimal::ONE - confidence) / Decimal::from(2);
        let (t, s, v) = match regime {
            Regime::Trend => (confidence, rest, rest),
            Regime::Sideways => (rest, confidence, rest),
            Regime::Volatile => (rest, rest, confidence),
        };
        RegimeReading {
            regime,
            confidence_trend: t,
            confidence_sideways: s,
            confidence_volatile: v,
            computed_at: Utc::now(),
            initializing: false,
        }
    }

    #[test]
    fn stable_selection_with_constant_inputs() {
        let strategies = default_strategy_set();
        let mut selector = StrategySelector::default();
        let bias = HashMap::new();
        let reading = reading(Regime::Trend, dec!(0.9));
        let (first, _) = selector.select(&reading, &strategies, &bias, StrategyHealth::Good, Utc::now());
        let (second, event) = selector.select(&reading, &strategies, &bias, StrategyHealth::Good, Utc::now());
        assert_eq!(first, second);
        assert!(event.is_none());
    }

    #[test]
    fn regime_change_triggers_switch_when_suitability_drops() {
        let strategies = default_strategy_set();
        let mut selector = StrategySelector::default();
        let bias = HashMap::new();
        let sideways = reading(Regime::Sideways, dec!(0.9));
        let (active, _) = selector.select(&sideways, &strategies, &bias, StrategyHealth::Good, Utc::now());
        assert_eq!(active, "MeanReversion");

        let trend = reading(Regime::Trend, dec!(0.9));
        let (active, event) = selector.select(&trend, &strategies, &bias, StrategyHealth::Good, Utc::now());
        assert_eq!(active, "TrendFollowing");
        assert!(event.is_some());
    }
}
