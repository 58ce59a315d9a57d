use crate::application::events::{EngineEvent, StatusCode, StatusEvent};
use crate::domain::account::{AccountSnapshot, Position};
use crate::domain::bar::{PositionSide, Side};
use crate::domain::performance::PerformanceMonitor;
use crate::domain::ports::{BrokerPort, Clock, OrderRequest, OrderState, OrderType};
use crate::domain::regime::Regime;
use crate::domain::risk::OrderPlan;
use crate::domain::strategy::Signal;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub signal: Signal,
    pub plan: OrderPlan,
}

/// Consumes accepted plans and talks to the `BrokerPort`. On fill, writes
/// `Trade`s to the shared `PerformanceMonitor` through this worker's
/// single-writer handle; no other component mutates it.
pub struct ExecutionWorker {
    broker: Arc<dyn BrokerPort>,
    clock: Arc<dyn Clock>,
    performance: Arc<RwLock<PerformanceMonitor>>,
    account: Arc<RwLock<AccountSnapshot>>,
    execute_rx: mpsc::Receiver<ExecuteRequest>,
    status_tx: broadcast::Sender<EngineEvent>,
    cancel_rx: watch::Receiver<bool>,
    open_positions: HashMap<String, Position>,
    pending: VecDeque<ExecuteRequest>,
}

impl ExecutionWorker {
    pub fn new(
        broker: Arc<dyn BrokerPort>,
        clock: Arc<dyn Clock>,
        performance: Arc<RwLock<PerformanceMonitor>>,
        account: Arc<RwLock<AccountSnapshot>>,
        execute_rx: mpsc::Receiver<ExecuteRequest>,
        status_tx: broadcast::Sender<EngineEvent>,
        cancel_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            broker,
            clock,
            performance,
            account,
            execute_rx,
            status_tx,
            cancel_rx,
            open_positions: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    pub async fn run(mut self) {
        self.refresh_account().await;
        let mut refresh_interval = tokio::time::interval(std::time::Duration::from_secs(5));
        loop {
            tokio::select! {
                changed = self.cancel_rx.changed() => {
                    if changed.is_err() || *self.cancel_rx.borrow() {
                        break;
                    }
                }
                _ = refresh_interval.tick() => {
                    self.refresh_account().await;
                }
                maybe_req = self.next_request() => {
                    match maybe_req {
                        Some(req) => self.process(req).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn next_request(&mut self) -> Option<ExecuteRequest> {
        if let Some(req) = self.pending.pop_front() {
            return Some(req);
        }
        self.execute_rx.recv().await
    }

    /// Coalesces same-symbol, same-side requests that queued up while the
    /// previous request for that symbol was in flight (latest wins);
    /// opposing sides or other symbols are kept and processed next.
    fn coalesce(&mut self, first: ExecuteRequest) -> ExecuteRequest {
        let mut latest = first;
        while let Ok(next) = self.execute_rx.try_recv() {
            if next.plan.symbol == latest.plan.symbol && next.plan.side == latest.plan.side {
                latest = next;
            } else {
                self.pending.push_back(next);
            }
        }
        latest
    }

    async fn process(&mut self, req: ExecuteRequest) {
        let req = self.coalesce(req);
        let ExecuteRequest { signal, plan } = req;

        let request = OrderRequest {
            symbol: plan.symbol.clone(),
            side: plan.side,
            qty: plan.qty,
            order_type: OrderType::Market,
            limit_price: None,
        };

        match self.broker.place_order(request).await {
            Ok(ack) => {
                info!(order_id = %ack.order_id, symbol = %plan.symbol, "ExecutionWorker: order accepted");
                self.emit_status(StatusCode::OrderAccepted, format!("order {} accepted", ack.order_id), Some(plan.symbol.clone()));
                self.settle(&ack.order_id, &signal, &plan).await;
            }
            Err(reject) => {
                warn!(reason = %reject, symbol = %plan.symbol, "ExecutionWorker: broker rejected order");
                self.emit_status(
                    StatusCode::OrderRejected,
                    format!("order for {} rejected: {reject}", plan.symbol),
                    Some(plan.symbol.clone()),
                );
            }
        }
    }

    async fn settle(&mut self, order_id: &str, signal: &Signal, plan: &crate::domain::risk::OrderPlan) {
        let status = match self.broker.order_status(order_id).await {
            Ok(status) => status,
            Err(e) => {
                error!(order_id = %order_id, error = %e, "ExecutionWorker: failed to read order status");
                return;
            }
        };
        if status.state != OrderState::Filled && status.state != OrderState::PartiallyFilled {
            return;
        }
        let fill_price = status.avg_fill_price.unwrap_or(plan.entry_price);
        let filled_qty = if status.filled_qty > Decimal::ZERO { status.filled_qty } else { plan.qty };

        let now = self.clock.now();
        if let Some(trade) = self.apply_fill(
            &plan.symbol,
            plan.side,
            filled_qty,
            fill_price,
            &signal.strategy_name,
            signal.regime_at_generation,
            now,
        ) {
            self.performance.write().await.record_trade(trade);
        }
        self.refresh_account().await;
    }

    fn apply_fill(
        &mut self,
        symbol: &str,
        side: Side,
        qty: Decimal,
        fill_price: Decimal,
        strategy_name: &str,
        regime: Regime,
        now: DateTime<Utc>,
    ) -> Option<crate::domain::account::Trade> {
        match self.open_positions.get(symbol).cloned() {
            None => {
                let position_side = match side {
                    Side::Buy => PositionSide::Long,
                    Side::Sell => PositionSide::Short,
                    Side::Hold => return None,
                };
                self.open_positions.insert(
                    symbol.to_string(),
                    Position {
                        symbol: symbol.to_string(),
                        side: position_side,
                        quantity: qty,
                        avg_entry_price: fill_price,
                        opened_at: now,
                    },
                );
                None
            }
            Some(mut position) => {
                let closes = matches!(
                    (position.side, side),
                    (PositionSide::Long, Side::Sell) | (PositionSide::Short, Side::Buy)
                );
                if closes {
                    let closed_qty = qty.min(position.quantity);
                    let realized_pnl = match position.side {
                        PositionSide::Long => (fill_price - position.avg_entry_price) * closed_qty,
                        PositionSide::Short => (position.avg_entry_price - fill_price) * closed_qty,
                    };
                    let trade = crate::domain::account::Trade {
                        symbol: symbol.to_string(),
                        side: position.side,
                        qty: closed_qty,
                        entry_price: position.avg_entry_price,
                        exit_price: fill_price,
                        opened_at: position.opened_at,
                        closed_at: now,
                        realized_pnl,
                        strategy_name: strategy_name.to_string(),
                        regime_at_entry: regime,
                    };
                    position.quantity -= closed_qty;
                    if position.quantity <= Decimal::ZERO {
                        self.open_positions.remove(symbol);
                    } else {
                        self.open_positions.insert(symbol.to_string(), position);
                    }
                    Some(trade)
                } else {
                    let new_qty = position.quantity + qty;
                    position.avg_entry_price =
                        (position.avg_entry_price * position.quantity + fill_price * qty) / new_qty;
                    position.quantity = new_qty;
                    self.open_positions.insert(symbol.to_string(), position);
                    None
                }
            }
        }
    }

    async fn refresh_account(&self) {
        match self.broker.get_account().await {
            Ok(snapshot) => {
                *self.account.write().await = snapshot;
            }
            Err(e) => {
                warn!(error = %e, "ExecutionWorker: account refresh failed");
            }
        }
    }

    fn emit_status(&self, code: StatusCode, message: String, symbol: Option<String>) {
        let _ = self.status_tx.send(EngineEvent::Status(StatusEvent {
            code,
            message,
            symbol,
            at: self.clock.now(),
        }));
    }
}
