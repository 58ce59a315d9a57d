use crate::application::control::EngineHandle;
use crate::application::events::EngineEvent;
use crate::application::workers::analysis_worker::AnalysisWorker;
use crate::application::workers::control_worker::{ControlRequest, ControlWorker};
use crate::application::workers::execution_worker::{ExecuteRequest, ExecutionWorker};
use crate::application::workers::stream_worker::StreamWorker;
use crate::config::Config;
use crate::domain::account::AccountSnapshot;
use crate::domain::performance::PerformanceMonitor;
use crate::domain::ports::{BrokerPort, Clock, MarketDataPort};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tracing::{error, info};

const INBOX_CAPACITY: usize = 1024;
const EXECUTE_CAPACITY: usize = 256;
const CONTROL_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Wires the four workers together; their join handles are handed to the
/// `ControlWorker` so `stop(timeout)` can await clean shutdown. Mirrors the
/// source's service-composition root: no worker constructs another, they are
/// all assembled here from shared ports and channels.
pub struct TradingEngine {
    config: Config,
    clock: Arc<dyn Clock>,
    market_data: Arc<dyn MarketDataPort>,
    broker: Arc<dyn BrokerPort>,
}

impl TradingEngine {
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        market_data: Arc<dyn MarketDataPort>,
        broker: Arc<dyn BrokerPort>,
    ) -> Self {
        Self { config, clock, market_data, broker }
    }

    /// Fetches the initial account snapshot, wires every channel, and
    /// spawns the four cooperative workers. Returns a cloneable command
    /// handle and a fresh subscription to the event broadcast.
    pub async fn start(self) -> Result<(EngineHandle, broadcast::Receiver<EngineEvent>)> {
        let initial_account = self.broker.get_account().await.unwrap_or(AccountSnapshot {
            portfolio_value: self.config.risk.capital,
            cash: self.config.risk.capital,
            buying_power: self.config.risk.capital,
            open_positions: Vec::new(),
        });

        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let (execute_tx, execute_rx) = mpsc::channel::<ExecuteRequest>(EXECUTE_CAPACITY);
        let (control_tx, control_rx) = mpsc::channel::<ControlRequest>(CONTROL_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (event_tx, event_rx) = broadcast::channel::<EngineEvent>(EVENT_CAPACITY);

        let performance = Arc::new(RwLock::new(PerformanceMonitor::new()));
        let account = Arc::new(RwLock::new(initial_account));

        let stream_worker = StreamWorker::new(
            self.market_data.clone(),
            self.clock.clone(),
            self.config.symbols.clone(),
            self.config.timeframe,
            self.config.reconnect.clone(),
            inbox_tx.clone(),
            event_tx.clone(),
            cancel_rx.clone(),
        );

        let analysis_worker = AnalysisWorker::new(
            self.config.clone(),
            self.clock.clone(),
            performance.clone(),
            account.clone(),
            inbox_rx,
            execute_tx,
            event_tx.clone(),
            cancel_rx.clone(),
        );

        let execution_worker = ExecutionWorker::new(
            self.broker.clone(),
            self.clock.clone(),
            performance.clone(),
            account.clone(),
            execute_rx,
            event_tx.clone(),
            cancel_rx.clone(),
        );

        let stream_handle = tokio::spawn(async move {
            if let Err(e) = stream_worker.run().await {
                error!(error = %e, "StreamWorker exited");
            }
        });
        let analysis_handle = tokio::spawn(analysis_worker.run());
        let execution_handle = tokio::spawn(execution_worker.run());

        let control_worker = ControlWorker::new(
            control_rx,
            inbox_tx.clone(),
            cancel_tx,
            vec![stream_handle, analysis_handle, execution_handle],
        );
        tokio::spawn(control_worker.run());

        info!(symbols = ?self.config.symbols, "TradingEngine started");

        Ok((EngineHandle::new(control_tx), event_rx))
    }
}
