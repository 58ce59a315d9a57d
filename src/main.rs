use adaptive_trader::application::engine::TradingEngine;
use adaptive_trader::application::events::EngineEvent;
use adaptive_trader::config::Config;
use adaptive_trader::domain::account::{AccountSnapshot, EngineMode};
use adaptive_trader::infrastructure::clock::SystemClock;
use adaptive_trader::infrastructure::test_support::{MockBroker, MockMarketData};
use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    if config.mode == EngineMode::Live {
        anyhow::bail!(
            "ENGINE_MODE=live requires a concrete BrokerPort/MarketDataPort adapter, \
             which is not wired into this build; run with ENGINE_MODE=paper or mock"
        );
    }

    let clock = Arc::new(SystemClock);
    let market_data = Arc::new(MockMarketData::new(config.buffer_capacity));
    let broker = Arc::new(MockBroker::new(AccountSnapshot {
        portfolio_value: config.risk.capital,
        cash: config.risk.capital,
        buying_power: config.risk.capital,
        open_positions: Vec::new(),
    }));

    let engine = TradingEngine::new(config, clock, market_data, broker);
    let (handle, mut events) = engine.start().await?;
    handle.start().await?;

    while let Ok(event) = events.recv().await {
        match event {
            EngineEvent::Recommendation(rec) => {
                tracing::info!(symbol = %rec.symbol, side = %rec.side, strategy = %rec.strategy_name, "{}", rec.rationale_text);
            }
            EngineEvent::Status(status) => {
                tracing::info!(code = ?status.code, symbol = ?status.symbol, "{}", status.message);
            }
            EngineEvent::Switch(switch) => {
                tracing::info!(from = %switch.from, to = %switch.to, "strategy switch");
            }
        }
    }

    Ok(())
}
