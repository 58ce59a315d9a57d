use crate::application::events::{
    EngineEvent, EngineSnapshot, EngineStatus, InboxMessage, Recommendation, StatusCode, StatusEvent,
};
use crate::application::workers::execution_worker::ExecuteRequest;
use crate::config::Config;
use crate::domain::account::AccountSnapshot;
use crate::domain::bar::{Bar, PositionSide, Side};
use crate::domain::bar_buffer::BarBuffer;
use crate::domain::errors::DataIntegrity;
use crate::domain::performance::PerformanceMonitor;
use crate::domain::ports::Clock;
use crate::domain::regime::RegimeClassifier;
use crate::domain::risk::RiskManager;
use crate::domain::selector::performance_bias;
use crate::domain::strategy::{Signal, Strategy};
use crate::domain::strategies::default_strategy_set;
use crate::domain::suppression::SignalSuppressor;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tracing::{info, warn};
use uuid::Uuid;

const INTEGRITY_WINDOW_SECS: i64 = 60;
const INTEGRITY_ESCALATION_THRESHOLD: u32 = 3;

struct SymbolState {
    buffer: BarBuffer,
    selector: crate::domain::selector::StrategySelector,
    active_strategy: String,
    integrity_errors: Vec<DateTime<Utc>>,
    halted: bool,
}

struct PendingRecommendation {
    signal: Signal,
    plan: crate::domain::risk::OrderPlan,
}

/// Consumes the inbox; exclusively mutates per-symbol `BarBuffer`s; runs
/// the decision pipeline. All buffer mutations happen here so no lock is
/// needed on the buffers themselves.
pub struct AnalysisWorker {
    config: Config,
    clock: Arc<dyn Clock>,
    classifier: RegimeClassifier,
    strategies: Vec<Arc<dyn Strategy>>,
    risk_manager: RiskManager,
    suppressor: SignalSuppressor,
    performance: Arc<RwLock<PerformanceMonitor>>,
    account: Arc<RwLock<AccountSnapshot>>,
    symbols: HashMap<String, SymbolState>,
    pending: HashMap<Uuid, PendingRecommendation>,
    inbox_rx: mpsc::Receiver<InboxMessage>,
    execute_tx: mpsc::Sender<ExecuteRequest>,
    event_tx: broadcast::Sender<EngineEvent>,
    cancel_rx: watch::Receiver<bool>,
}

impl AnalysisWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        performance: Arc<RwLock<PerformanceMonitor>>,
        account: Arc<RwLock<AccountSnapshot>>,
        inbox_rx: mpsc::Receiver<InboxMessage>,
        execute_tx: mpsc::Sender<ExecuteRequest>,
        event_tx: broadcast::Sender<EngineEvent>,
        cancel_rx: watch::Receiver<bool>,
    ) -> Self {
        let symbols = config
            .symbols
            .iter()
            .map(|symbol| {
                let state = SymbolState {
                    buffer: BarBuffer::new(symbol.clone(), config.buffer_capacity),
                    selector: crate::domain::selector::StrategySelector::default(),
                    active_strategy: default_strategy_set()[0].name().to_string(),
                    integrity_errors: Vec::new(),
                    halted: false,
                };
                (symbol.clone(), state)
            })
            .collect();

        Self {
            suppressor: SignalSuppressor::new(config.suppression_ttl),
            strategies: default_strategy_set(),
            config,
            clock,
            classifier: RegimeClassifier::default(),
            risk_manager: RiskManager::new(),
            performance,
            account,
            symbols,
            pending: HashMap::new(),
            inbox_rx,
            execute_tx,
            event_tx,
            cancel_rx,
        }
    }

    pub async fn run(mut self) {
        let mut tick_interval = tokio::time::interval(self.config.decision_tick_period);
        loop {
            tokio::select! {
                changed = self.cancel_rx.changed() => {
                    if changed.is_err() || *self.cancel_rx.borrow() {
                        break;
                    }
                }
                _ = tick_interval.tick() => {
                    let symbols: Vec<String> = self.symbols.keys().cloned().collect();
                    for symbol in symbols {
                        self.run_decision_pipeline(&symbol).await;
                    }
                }
                maybe_msg = self.inbox_rx.recv() => {
                    match maybe_msg {
                        Some(msg) => self.handle_message(msg).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle_message(&mut self, message: InboxMessage) {
        match message {
            InboxMessage::BarClose(bar) => {
                let symbol = bar.symbol.clone();
                if self.ingest_bar(bar) {
                    self.run_decision_pipeline(&symbol).await;
                }
            }
            InboxMessage::BarUpdate(bar) => {
                self.ingest_bar(bar);
            }
            InboxMessage::Trade { .. } => {
                // Latest-price tracking only; bar events already drive the buffer.
            }
            InboxMessage::Feedback { signal_id, accepted } => {
                self.handle_feedback(signal_id, accepted).await;
            }
            InboxMessage::SnapshotRequest(reply) => {
                let snapshot = self.build_snapshot().await;
                let _ = reply.send(snapshot);
            }
        }
    }

    fn ingest_bar(&mut self, bar: Bar) -> bool {
        let symbol = bar.symbol.clone();
        let Some(state) = self.symbols.get_mut(&symbol) else {
            warn!(symbol = %symbol, "AnalysisWorker: bar for untracked symbol");
            return false;
        };
        let now = self.clock.now();
        let tail_open_time = state.buffer.snapshot(1).first().map(|b| b.open_time);
        let accepted = state.buffer.append_or_update(bar.clone());
        if !accepted {
            if let Some(tail_open_time) = tail_open_time {
                let error = DataIntegrity::OutOfOrderBar {
                    symbol: symbol.clone(),
                    tail_open_time,
                    got_open_time: bar.open_time,
                };
                warn!(error = %error, "AnalysisWorker: data integrity error");
            }
            state.integrity_errors.push(now);
            state.integrity_errors.retain(|t| (now - *t).num_seconds() <= INTEGRITY_WINDOW_SECS);
            if state.integrity_errors.len() as u32 >= INTEGRITY_ESCALATION_THRESHOLD {
                state.halted = true;
                self.emit_status(
                    StatusCode::Stopped,
                    format!("{symbol}: three integrity errors within {INTEGRITY_WINDOW_SECS}s, halting symbol"),
                    Some(symbol.clone()),
                );
            }
        }
        accepted
    }

    async fn run_decision_pipeline(&mut self, symbol: &str) {
        let now = self.clock.now();
        let (length, window, latest_price, atr) = {
            let Some(state) = self.symbols.get(symbol) else { return };
            if state.halted {
                return;
            }
            let window = state.buffer.snapshot(self.config.buffer_capacity);
            (state.buffer.length(), window, state.buffer.latest_price(), state.buffer.indicators().atr_14)
        };

        if length < self.config.minimum_bars {
            self.emit_status(
                StatusCode::Initializing,
                format!("{symbol}: warming up ({length}/{} bars)", self.config.minimum_bars),
                Some(symbol.to_string()),
            );
            return;
        }

        let reading = self.classifier.classify(&window, now);

        let bias_map = self.performance_bias_map(symbol, reading.regime).await;
        let health = self.performance.read().await.metrics_for_strategy(
            self.symbols.get(symbol).map(|s| s.active_strategy.clone()).unwrap_or_default().as_str(),
            crate::domain::performance::DEFAULT_TRADE_WINDOW,
        ).state;

        let (active_name, switch_event) = {
            let Some(state) = self.symbols.get_mut(symbol) else { return };
            state.selector.select(&reading, &self.strategies, &bias_map, health, now)
        };

        if let Some(event) = switch_event.clone() {
            info!(symbol = %symbol, from = %event.from, to = %event.to, "AnalysisWorker: strategy switch");
            let _ = self.event_tx.send(EngineEvent::Switch(event));
        }
        if let Some(state) = self.symbols.get_mut(symbol) {
            state.active_strategy = active_name.clone();
        }

        let Some(strategy) = self.strategies.iter().find(|s| s.name() == active_name) else {
            return;
        };

        let current_position = self.account.read().await.open_positions.iter().find(|p| p.symbol == symbol).map(|p| p.side);

        let side = strategy.generate_signal_with_position(&window, current_position);
        if side == Side::Hold {
            self.emit_status(StatusCode::Scanning, format!("{symbol}: scanning, no signal"), Some(symbol.to_string()));
            return;
        }

        let Some(reference_price) = latest_price else { return };
        let signal = Signal {
            side,
            generated_at: now,
            symbol: symbol.to_string(),
            reference_price,
            strategy_name: active_name.clone(),
            regime_at_generation: reading.regime,
        };

        if !self.suppressor.should_emit(&signal, now) {
            self.emit_status(StatusCode::SignalSuppressed, format!("{symbol}: signal suppressed"), Some(symbol.to_string()));
            return;
        }

        let stop_loss = self.risk_manager.derive_stop_loss(reference_price, atr, side, &self.config.risk);
        let account_snapshot = self.account.read().await.clone();

        match self
            .risk_manager
            .size_and_validate(&signal, &account_snapshot, &self.config.risk, stop_loss, atr)
        {
            Ok(plan) => {
                let signal_id = Uuid::new_v4();
                let rationale = rationale_text(&signal, &reading, &plan);
                let recommendation = Recommendation {
                    signal_id,
                    symbol: symbol.to_string(),
                    side,
                    reference_price,
                    strategy_name: active_name.clone(),
                    regime: reading.regime,
                    regime_confidence: reading.confidence_of(reading.regime),
                    risk_score: plan.risk_score,
                    risk_level: plan.risk_level,
                    suggested_qty: plan.qty,
                    stop_loss: plan.stop_loss,
                    take_profit: plan.take_profit,
                    generated_at: now,
                    rationale_text: rationale,
                };

                self.pending.insert(signal_id, PendingRecommendation { signal: signal.clone(), plan: plan.clone() });

                let _ = self.event_tx.send(EngineEvent::Recommendation(recommendation));
                self.emit_status(StatusCode::SignalEmitted, format!("{symbol}: {side} signal emitted"), Some(symbol.to_string()));

                if self.config.auto_execute {
                    self.dispatch_execution(signal_id).await;
                }
            }
            Err(reject) => {
                self.emit_status(
                    StatusCode::OrderRejected,
                    format!("{symbol}: risk check rejected signal: {reject}"),
                    Some(symbol.to_string()),
                );
            }
        }
    }

    async fn handle_feedback(&mut self, signal_id: Uuid, accepted: bool) {
        if accepted {
            self.dispatch_execution(signal_id).await;
            return;
        }
        if let Some(pending) = self.pending.remove(&signal_id) {
            let now = self.clock.now();
            self.suppressor.record_user_decision(&pending.signal, false, now);
        }
    }

    async fn dispatch_execution(&mut self, signal_id: Uuid) {
        if let Some(pending) = self.pending.remove(&signal_id) {
            let request = ExecuteRequest { signal: pending.signal, plan: pending.plan };
            if self.execute_tx.send(request).await.is_err() {
                warn!("AnalysisWorker: execution channel closed");
            }
        }
    }

    async fn performance_bias_map(
        &self,
        _symbol: &str,
        regime: crate::domain::regime::Regime,
    ) -> HashMap<String, rust_decimal::Decimal> {
        let monitor = self.performance.read().await;
        self.strategies
            .iter()
            .map(|s| {
                let sharpe = monitor.sharpe_for(s.name(), regime, crate::domain::performance::DEFAULT_TRADE_WINDOW);
                (s.name().to_string(), performance_bias(sharpe))
            })
            .collect()
    }

    async fn build_snapshot(&self) -> EngineSnapshot {
        let performance = self.performance.read().await;
        let mut per_symbol_perf = HashMap::new();
        let mut active_strategy = HashMap::new();
        let mut error_counters = HashMap::new();
        for (symbol, state) in &self.symbols {
            active_strategy.insert(symbol.clone(), state.active_strategy.clone());
            per_symbol_perf.insert(symbol.clone(), performance.metrics_for_strategy(&state.active_strategy, crate::domain::performance::DEFAULT_TRADE_WINDOW));
            error_counters.insert(symbol.clone(), state.integrity_errors.len() as u64);
        }

        EngineSnapshot {
            status: EngineStatus::Running,
            tracked_symbols: self.symbols.keys().cloned().collect(),
            active_strategy,
            performance: per_symbol_perf,
            error_counters,
            at: self.clock.now(),
        }
    }

    fn emit_status(&self, code: StatusCode, message: String, symbol: Option<String>) {
        let _ = self.event_tx.send(EngineEvent::Status(StatusEvent {
            code,
            message,
            symbol,
            at: self.clock.now(),
        }));
    }
}

/// A short templated sentence from the structured facts already on hand —
/// not a separate model, per the design note on the source's narrative
/// overlay.
fn rationale_text(signal: &Signal, reading: &crate::domain::regime::RegimeReading, plan: &crate::domain::risk::OrderPlan) -> String {
    format!(
        "{} generated a {} signal in a {} regime (confidence {:.0}%); sized {} shares with {:?} risk.",
        signal.strategy_name,
        signal.side,
        reading.regime,
        reading.confidence_of(reading.regime) * rust_decimal::Decimal::from(100),
        plan.qty,
        plan.risk_level,
    )
}
