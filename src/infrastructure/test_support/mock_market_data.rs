use crate::domain::ports::{MarketDataPort, StreamEvent};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};

/// Feeds a scripted `StreamEvent` sequence to whoever subscribes. Hands out
/// the same receiver's sending half so a test can push events after
/// `subscribe` is called.
pub struct MockMarketData {
    sender: Mutex<Option<Sender<StreamEvent>>>,
    capacity: usize,
}

impl MockMarketData {
    pub fn new(capacity: usize) -> Self {
        Self { sender: Mutex::new(None), capacity }
    }

    /// Pushes an event to the most recent subscriber. No-op if nobody has
    /// subscribed yet or the subscriber dropped its receiver.
    pub async fn push(&self, event: StreamEvent) {
        let maybe_sender = self.sender.lock().expect("MockMarketData mutex poisoned").clone();
        if let Some(sender) = maybe_sender {
            let _ = sender.send(event).await;
        }
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn subscribe(&self, _symbols: Vec<String>, _timeframe: Duration) -> Result<Receiver<StreamEvent>> {
        let (tx, rx) = mpsc::channel(self.capacity.max(1));
        *self.sender.lock().expect("MockMarketData mutex poisoned") = Some(tx);
        Ok(rx)
    }
}
