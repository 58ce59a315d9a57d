use crate::domain::bar::{Bar, Side};
use crate::domain::performance::PerformanceWindow;
use crate::domain::regime::Regime;
use crate::domain::risk::RiskLevel;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Typed inbox messages the `StreamWorker` hands the `AnalysisWorker`.
///
/// Not `Clone`/`Debug`-derived: `SnapshotRequest` carries a one-shot reply
/// channel, which is neither.
pub enum InboxMessage {
    BarClose(Bar),
    BarUpdate(Bar),
    Trade {
        symbol: String,
        time: DateTime<Utc>,
        price: Decimal,
    },
    Feedback {
        signal_id: Uuid,
        accepted: bool,
    },
    SnapshotRequest(oneshot::Sender<EngineSnapshot>),
}

impl std::fmt::Debug for InboxMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InboxMessage::BarClose(bar) => f.debug_tuple("BarClose").field(bar).finish(),
            InboxMessage::BarUpdate(bar) => f.debug_tuple("BarUpdate").field(bar).finish(),
            InboxMessage::Trade { symbol, time, price } => {
                f.debug_struct("Trade").field("symbol", symbol).field("time", time).field("price", price).finish()
            }
            InboxMessage::Feedback { signal_id, accepted } => f
                .debug_struct("Feedback")
                .field("signal_id", signal_id)
                .field("accepted", accepted)
                .finish(),
            InboxMessage::SnapshotRequest(_) => f.write_str("SnapshotRequest(..)"),
        }
    }
}

/// The `ControlPort` command surface.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    Start,
    Stop { timeout: Duration },
    Snapshot,
    Accept { signal_id: Uuid },
    Skip { signal_id: Uuid },
}

#[derive(Debug, Clone)]
pub enum EngineCommandResponse {
    Started,
    Stopped,
    Snapshot(Box<EngineSnapshot>),
    Accepted,
    Skipped,
    Rejected { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Initializing,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub signal_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub reference_price: Decimal,
    pub strategy_name: String,
    pub regime: Regime,
    pub regime_confidence: Decimal,
    pub risk_score: Decimal,
    pub risk_level: RiskLevel,
    pub suggested_qty: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub generated_at: DateTime<Utc>,
    pub rationale_text: String,
}

/// Machine-readable status codes named in the error-handling design: every
/// status event carries one of these plus a human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Initializing,
    Scanning,
    SignalSuppressed,
    SignalEmitted,
    OrderAccepted,
    OrderRejected,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub code: StatusCode,
    pub message: String,
    pub symbol: Option<String>,
    pub at: DateTime<Utc>,
}

/// Broadcast to any outside consumer of the recommendation/status streams
/// (the UI collaborator, in the source system).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Recommendation(Recommendation),
    Status(StatusEvent),
    Switch(crate::domain::selector::SwitchEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub status: EngineStatus,
    pub tracked_symbols: Vec<String>,
    pub active_strategy: HashMap<String, String>,
    pub performance: HashMap<String, PerformanceWindow>,
    pub error_counters: HashMap<String, u64>,
    pub at: DateTime<Utc>,
}
