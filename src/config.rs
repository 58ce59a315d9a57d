use crate::domain::account::{EngineMode, RiskConfig, StopLossMethod};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::env;
use std::str::FromStr;
use std::time::Duration;

impl FromStr for EngineMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paper" => Ok(EngineMode::Paper),
            "live" => Ok(EngineMode::Live),
            "mock" => Ok(EngineMode::Mock),
            _ => anyhow::bail!("Invalid ENGINE_MODE: {}. Must be 'paper', 'live' or 'mock'", s),
        }
    }
}

impl FromStr for StopLossMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "percent" => Ok(StopLossMethod::Percent),
            "atr" => Ok(StopLossMethod::Atr),
            "fixed" => Ok(StopLossMethod::Fixed),
            _ => anyhow::bail!("Invalid SL_METHOD: {}. Must be 'percent', 'atr' or 'fixed'", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
    pub quiescent_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            max_attempts: 3,
            quiescent_delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: EngineMode,
    /// Opaque passthrough; concrete broker adapters interpret this.
    pub broker_credentials: Option<String>,
    pub symbols: Vec<String>,
    pub timeframe: Duration,
    pub risk: RiskConfig,
    pub decision_tick_period: Duration,
    pub suppression_ttl: chrono::Duration,
    pub reconnect: ReconnectPolicy,
    pub buffer_capacity: usize,
    pub minimum_bars: usize,
    pub auto_execute: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mode_str = env::var("ENGINE_MODE").unwrap_or_else(|_| "paper".to_string());
        let mode = EngineMode::from_str(&mode_str)?;

        let broker_credentials = env::var("BROKER_CREDENTIALS").ok();

        let symbols_str = env::var("SYMBOLS").unwrap_or_else(|_| "AAPL".to_string());
        let symbols: Vec<String> = symbols_str.split(',').map(|s| s.trim().to_string()).collect();

        let timeframe_secs = env::var("TIMEFRAME_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .context("Failed to parse TIMEFRAME_SECS")?;

        let capital = env::var("INITIAL_CAPITAL")
            .unwrap_or_else(|_| "100000".to_string())
            .parse::<f64>()
            .context("Failed to parse INITIAL_CAPITAL")?;

        let risk_per_trade_fraction = env::var("RISK_PER_TRADE_FRACTION")
            .unwrap_or_else(|_| "0.01".to_string())
            .parse::<f64>()
            .context("Failed to parse RISK_PER_TRADE_FRACTION")?;

        let max_position_fraction = env::var("MAX_POSITION_FRACTION")
            .unwrap_or_else(|_| "0.25".to_string())
            .parse::<f64>()
            .context("Failed to parse MAX_POSITION_FRACTION")?;

        let max_portfolio_risk_fraction = env::var("MAX_PORTFOLIO_RISK_FRACTION")
            .unwrap_or_else(|_| "0.5".to_string())
            .parse::<f64>()
            .context("Failed to parse MAX_PORTFOLIO_RISK_FRACTION")?;

        let reward_risk_ratio = env::var("REWARD_RISK_RATIO")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<f64>()
            .context("Failed to parse REWARD_RISK_RATIO")?;

        let cash_floor = env::var("CASH_FLOOR")
            .unwrap_or_else(|_| "0.05".to_string())
            .parse::<f64>()
            .context("Failed to parse CASH_FLOOR")?;

        let sl_method_str = env::var("SL_METHOD").unwrap_or_else(|_| "atr".to_string());
        let sl_method = StopLossMethod::from_str(&sl_method_str)?;

        let decision_tick_secs = env::var("DECISION_TICK_SECS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u64>()
            .context("Failed to parse DECISION_TICK_SECS")?;

        let suppression_ttl_secs = env::var("SUPPRESSION_TTL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse::<i64>()
            .context("Failed to parse SUPPRESSION_TTL_SECS")?;

        let buffer_capacity = env::var("BUFFER_CAPACITY")
            .unwrap_or_else(|_| "250".to_string())
            .parse::<usize>()
            .context("Failed to parse BUFFER_CAPACITY")?;

        let minimum_bars = env::var("MINIMUM_BARS")
            .unwrap_or_else(|_| "20".to_string())
            .parse::<usize>()
            .context("Failed to parse MINIMUM_BARS")?;

        let auto_execute = env::var("AUTO_EXECUTE")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .context("Failed to parse AUTO_EXECUTE")?;

        let reconnect = ReconnectPolicy {
            initial_backoff: Duration::from_secs(
                env::var("RECONNECT_INITIAL_BACKOFF_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .context("Failed to parse RECONNECT_INITIAL_BACKOFF_SECS")?,
            ),
            max_backoff: Duration::from_secs(
                env::var("RECONNECT_MAX_BACKOFF_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("Failed to parse RECONNECT_MAX_BACKOFF_SECS")?,
            ),
            max_attempts: env::var("RECONNECT_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Failed to parse RECONNECT_MAX_ATTEMPTS")?,
            quiescent_delay: Duration::from_secs(
                env::var("RECONNECT_QUIESCENT_DELAY_SECS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .context("Failed to parse RECONNECT_QUIESCENT_DELAY_SECS")?,
            ),
        };

        let risk = RiskConfig {
            capital: Decimal::from_f64(capital).context("Invalid INITIAL_CAPITAL")?,
            risk_per_trade_fraction: Decimal::from_f64(risk_per_trade_fraction)
                .context("Invalid RISK_PER_TRADE_FRACTION")?,
            max_position_fraction: Decimal::from_f64(max_position_fraction)
                .context("Invalid MAX_POSITION_FRACTION")?,
            max_portfolio_risk_fraction: Decimal::from_f64(max_portfolio_risk_fraction)
                .context("Invalid MAX_PORTFOLIO_RISK_FRACTION")?,
            reward_risk_ratio: Decimal::from_f64(reward_risk_ratio).context("Invalid REWARD_RISK_RATIO")?,
            sl_method,
            cash_floor: Decimal::from_f64(cash_floor).context("Invalid CASH_FLOOR")?,
        };

        Ok(Self {
            mode,
            broker_credentials,
            symbols,
            timeframe: Duration::from_secs(timeframe_secs),
            risk,
            decision_tick_period: Duration::from_secs(decision_tick_secs),
            suppression_ttl: chrono::Duration::seconds(suppression_ttl_secs),
            reconnect,
            buffer_capacity,
            minimum_bars,
            auto_execute,
        })
    }
}
