use crate::application::events::{EngineEvent, InboxMessage, StatusCode, StatusEvent};
use crate::config::ReconnectPolicy;
use crate::domain::errors::Fatal;
use crate::domain::ports::{Clock, MarketDataPort, StreamEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

/// Owns the `MarketDataPort` subscription; converts each inbound event
/// into a typed inbox message. The only worker that talks to the stream —
/// reconnects with backoff live here so `AnalysisWorker` never blocks on
/// connection state.
pub struct StreamWorker {
    market_data: Arc<dyn MarketDataPort>,
    clock: Arc<dyn Clock>,
    symbols: Vec<String>,
    timeframe: std::time::Duration,
    reconnect: ReconnectPolicy,
    inbox_tx: mpsc::Sender<InboxMessage>,
    status_tx: broadcast::Sender<EngineEvent>,
    cancel_rx: watch::Receiver<bool>,
}

impl StreamWorker {
    pub fn new(
        market_data: Arc<dyn MarketDataPort>,
        clock: Arc<dyn Clock>,
        symbols: Vec<String>,
        timeframe: std::time::Duration,
        reconnect: ReconnectPolicy,
        inbox_tx: mpsc::Sender<InboxMessage>,
        status_tx: broadcast::Sender<EngineEvent>,
        cancel_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            market_data,
            clock,
            symbols,
            timeframe,
            reconnect,
            inbox_tx,
            status_tx,
            cancel_rx,
        }
    }

    pub async fn run(mut self) -> Result<(), Fatal> {
        let mut attempts: u32 = 0;
        // Guards against overlapping reconnect attempts (the "connecting" latch).
        loop {
            if *self.cancel_rx.borrow() {
                return Ok(());
            }

            match self.market_data.subscribe(self.symbols.clone(), self.timeframe).await {
                Ok(mut receiver) => {
                    attempts = 0;
                    loop {
                        tokio::select! {
                            changed = self.cancel_rx.changed() => {
                                if changed.is_err() || *self.cancel_rx.borrow() {
                                    return Ok(());
                                }
                            }
                            maybe_event = receiver.recv() => {
                                match maybe_event {
                                    Some(event) => self.handle_event(event).await,
                                    None => {
                                        warn!("StreamWorker: upstream channel closed, reconnecting");
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "StreamWorker: subscribe failed");
                }
            }

            attempts += 1;
            if attempts > self.reconnect.max_attempts {
                let reason = format!("connection limit exceeded after {attempts} attempts");
                let _ = self.status_tx.send(EngineEvent::Status(StatusEvent {
                    code: StatusCode::Stopped,
                    message: reason.clone(),
                    symbol: None,
                    at: self.clock.now(),
                }));
                return Err(Fatal { reason });
            }

            let backoff = self.backoff_for(attempts);
            info!(attempt = attempts, backoff_secs = backoff.as_secs(), "StreamWorker: backing off before reconnect");
            self.clock.sleep(backoff).await;
            self.clock.sleep(self.reconnect.quiescent_delay).await;
        }
    }

    fn backoff_for(&self, attempt: u32) -> std::time::Duration {
        let scaled = self.reconnect.initial_backoff.saturating_mul(1 << attempt.saturating_sub(1).min(8));
        scaled.min(self.reconnect.max_backoff)
    }

    async fn handle_event(&self, event: StreamEvent) {
        let message = match event {
            StreamEvent::BarClose(bar) => InboxMessage::BarClose(bar),
            StreamEvent::BarUpdate(bar) => InboxMessage::BarUpdate(bar),
            StreamEvent::Trade { symbol, time, price, .. } => InboxMessage::Trade { symbol, time, price },
            StreamEvent::Disconnect { reason } => {
                warn!(reason = %reason, "StreamWorker: upstream disconnect");
                return;
            }
        };
        if self.inbox_tx.send(message).await.is_err() {
            warn!("StreamWorker: inbox closed, dropping event");
        }
    }
}

