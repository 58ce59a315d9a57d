use thiserror::Error;

/// Disconnect or timeout on the market-data stream. Recovered by
/// `StreamWorker` with backoff; no pipeline disruption beyond the gap.
#[derive(Debug, Error, Clone)]
pub enum TransientStreamError {
    #[error("stream disconnected: {reason}")]
    Disconnected { reason: String },
    #[error("stream receive timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

/// The upstream stream refuses new subscriptions. Fatal for this engine
/// instance.
#[derive(Debug, Error, Clone)]
#[error("connection limit exceeded after {attempts} attempts")]
pub struct ConnectionLimitExceeded {
    pub attempts: u32,
}

/// Validation or rate-limit failure on order submit. Non-fatal.
#[derive(Debug, Error, Clone)]
#[error("broker rejected order: {reason}")]
pub struct BrokerReject {
    pub reason: String,
}

/// Local risk validation failed. Non-fatal; the caller turns this into an
/// informational "no trade" recommendation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RiskReject {
    #[error("sized quantity is zero")]
    ZeroQuantity,
    #[error("insufficient buying power: needed {needed}, available {available}")]
    InsufficientBuyingPower { needed: String, available: String },
    #[error("portfolio concentration {projected} would exceed cap {cap}")]
    ConcentrationExceeded { projected: String, cap: String },
    #[error("portfolio drawdown {drawdown} exceeds max {max}")]
    PortfolioRiskExceeded { drawdown: String, max: String },
}

/// Out-of-order bar, NaN price, or other feed-integrity violation. The
/// offending event is dropped and a per-symbol counter incremented.
#[derive(Debug, Error, Clone)]
pub enum DataIntegrity {
    #[error("out-of-order bar for {symbol}: tail={tail_open_time} got={got_open_time}")]
    OutOfOrderBar {
        symbol: String,
        tail_open_time: i64,
        got_open_time: i64,
    },
    #[error("non-finite price for {symbol}")]
    NonFinitePrice { symbol: String },
}

/// Any unexpected condition the engine cannot reason about. Transitions
/// the engine to `Stopped`.
#[derive(Debug, Error, Clone)]
#[error("fatal engine error: {reason}")]
pub struct Fatal {
    pub reason: String,
}
