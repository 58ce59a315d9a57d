use crate::domain::account::AccountSnapshot;
use crate::domain::bar::{Bar, Side};
use crate::domain::errors::{BrokerReject, TransientStreamError};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    BarClose(Bar),
    BarUpdate(Bar),
    Trade {
        symbol: String,
        time: DateTime<Utc>,
        price: Decimal,
        size: Decimal,
    },
    Disconnect {
        reason: String,
    },
}

/// Inbound stream of bars and trades for subscribed symbols.
///
/// `subscribe` hands back a channel rather than a pull API: the adapter
/// owns the upstream connection and pushes events as they arrive, the same
/// shape the engine's `StreamWorker` expects to drain in a `select!` loop.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    async fn subscribe(&self, symbols: Vec<String>, timeframe: Duration) -> Result<Receiver<StreamEvent>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatus {
    pub state: OrderState,
    pub filled_qty: Decimal,
    pub avg_fill_price: Option<Decimal>,
}

/// Outbound order placement, position listing, account query. Idempotent
/// on `order_id` within a short retry window; `ExecutionWorker` relies on
/// this and does not retry a submit whose acknowledgement was lost.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck, BrokerReject>;
    async fn get_positions(&self) -> Result<Vec<crate::domain::account::Position>>;
    async fn get_account(&self) -> Result<AccountSnapshot>;
    async fn close_position(&self, symbol: &str) -> Result<()>;
    async fn order_status(&self, order_id: &str) -> Result<OrderStatus>;
}

/// Monotonic time source; supplies "now" and suspensions. Injectable so
/// suppression TTLs and reconnect backoff can be driven deterministically
/// in tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

/// Marker re-export so callers that only need the disconnect error don't
/// have to reach into `errors` directly.
pub type StreamResult<T> = std::result::Result<T, TransientStreamError>;
