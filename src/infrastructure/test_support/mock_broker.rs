use crate::domain::account::{AccountSnapshot, Position};
use crate::domain::errors::BrokerReject;
use crate::domain::ports::{BrokerPort, OrderAck, OrderRequest, OrderState, OrderStatus};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory broker double. Fills every accepted order immediately at
/// `fill_price` (or the order's limit price); `set_reject` makes the next
/// `place_order` call fail, mirroring a rate-limit or margin rejection.
pub struct MockBroker {
    account: Mutex<AccountSnapshot>,
    orders: Mutex<HashMap<String, OrderStatus>>,
    next_order_id: AtomicU64,
    fill_price: Mutex<Decimal>,
    reject_next: Mutex<bool>,
}

impl MockBroker {
    pub fn new(starting_account: AccountSnapshot) -> Self {
        Self {
            account: Mutex::new(starting_account),
            orders: Mutex::new(HashMap::new()),
            next_order_id: AtomicU64::new(1),
            fill_price: Mutex::new(Decimal::ZERO),
            reject_next: Mutex::new(false),
        }
    }

    pub fn set_fill_price(&self, price: Decimal) {
        *self.fill_price.lock().expect("MockBroker mutex poisoned") = price;
    }

    pub fn set_reject_next(&self, reject: bool) {
        *self.reject_next.lock().expect("MockBroker mutex poisoned") = reject;
    }

    pub fn account_snapshot(&self) -> AccountSnapshot {
        self.account.lock().expect("MockBroker mutex poisoned").clone()
    }
}

#[async_trait]
impl BrokerPort for MockBroker {
    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck, BrokerReject> {
        if std::mem::take(&mut *self.reject_next.lock().expect("MockBroker mutex poisoned")) {
            return Err(BrokerReject { reason: "simulated rejection".to_string() });
        }

        let order_id = format!("mock-{}", self.next_order_id.fetch_add(1, Ordering::SeqCst));
        let fill_price = request
            .limit_price
            .unwrap_or(*self.fill_price.lock().expect("MockBroker mutex poisoned"));

        {
            let mut account = self.account.lock().expect("MockBroker mutex poisoned");
            let notional = request.qty * fill_price;
            account.cash -= notional;
            account.buying_power -= notional;
            let position = Position {
                symbol: request.symbol.clone(),
                side: match request.side {
                    crate::domain::bar::Side::Sell => crate::domain::bar::PositionSide::Short,
                    _ => crate::domain::bar::PositionSide::Long,
                },
                quantity: request.qty,
                avg_entry_price: fill_price,
                opened_at: chrono::Utc::now(),
            };
            account.open_positions.retain(|p| p.symbol != request.symbol);
            account.open_positions.push(position);
        }

        self.orders.lock().expect("MockBroker mutex poisoned").insert(
            order_id.clone(),
            OrderStatus { state: OrderState::Filled, filled_qty: request.qty, avg_fill_price: Some(fill_price) },
        );

        Ok(OrderAck { order_id })
    }

    async fn get_positions(&self) -> Result<Vec<Position>> {
        Ok(self.account.lock().expect("MockBroker mutex poisoned").open_positions.clone())
    }

    async fn get_account(&self) -> Result<AccountSnapshot> {
        Ok(self.account.lock().expect("MockBroker mutex poisoned").clone())
    }

    async fn close_position(&self, symbol: &str) -> Result<()> {
        self.account
            .lock()
            .expect("MockBroker mutex poisoned")
            .open_positions
            .retain(|p| p.symbol != symbol);
        Ok(())
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus> {
        self.orders
            .lock()
            .expect("MockBroker mutex poisoned")
            .get(order_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown order_id {order_id}"))
    }
}
