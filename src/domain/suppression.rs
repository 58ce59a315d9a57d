use crate::domain::bar::Side;
use crate::domain::regime::Regime;
use crate::domain::strategy::Signal;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuppressionKey {
    pub strategy_name: String,
    pub regime: Regime,
    pub side: Side,
}

impl SuppressionKey {
    pub fn from_signal(signal: &Signal) -> Self {
        Self {
            strategy_name: signal.strategy_name.clone(),
            regime: signal.regime_at_generation,
            side: signal.side,
        }
    }
}

#[derive(Debug, Clone)]
struct SuppressionEntry {
    until_time: DateTime<Utc>,
    count: u32,
}

/// Short-term memory of user rejections; gates repeated same-context
/// signals for `ttl` after a `Skip`.
///
/// Owned by the `AnalysisWorker`; mutated only on decision ticks and
/// user-feedback commands routed through the inbox.
pub struct SignalSuppressor {
    ttl: Duration,
    entries: HashMap<SuppressionKey, SuppressionEntry>,
}

impl Default for SignalSuppressor {
    fn default() -> Self {
        Self::new(Duration::minutes(15))
    }
}

impl SignalSuppressor {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn should_emit(&self, signal: &Signal, now: DateTime<Utc>) -> bool {
        let key = SuppressionKey::from_signal(signal);
        match self.entries.get(&key) {
            Some(entry) => now >= entry.until_time,
            None => true,
        }
    }

    pub fn record_user_decision(&mut self, signal: &Signal, accepted: bool, now: DateTime<Utc>) {
        let key = SuppressionKey::from_signal(signal);
        if accepted {
            self.entries.remove(&key);
        } else {
            let count = self.entries.get(&key).map(|e| e.count + 1).unwrap_or(1);
            self.entries.insert(
                key,
                SuppressionEntry {
                    until_time: now + self.ttl,
                    count,
                },
            );
        }
    }

    /// Drop expired entries; callers may call this periodically to bound
    /// memory, but `should_emit` is correct without it.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| entry.until_time > now);
    }
}
