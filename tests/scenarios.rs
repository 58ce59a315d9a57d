//! End-to-end scenarios driving a full `TradingEngine` through `MockMarketData`
//! and `MockBroker` on a `TestClock`. Bar sequences are constructed by hand so
//! the exact indicator/regime/strategy math resolves a specific way; see
//! DESIGN.md for the derivations.

use adaptive_trader::application::{EngineHandle, TradingEngine};
use adaptive_trader::application::events::{EngineEvent, Recommendation, StatusCode};
use adaptive_trader::config::{Config, ReconnectPolicy};
use adaptive_trader::domain::account::{AccountSnapshot, EngineMode, RiskConfig};
use adaptive_trader::domain::bar::{Bar, Side};
use adaptive_trader::domain::ports::StreamEvent;
use adaptive_trader::domain::regime::{Regime, RegimeClassifier};
use adaptive_trader::domain::selector::SwitchReason;
use adaptive_trader::infrastructure::test_support::{MockBroker, MockMarketData, TestClock};
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

const SYMBOL: &str = "TEST";

fn test_config(minimum_bars: usize, buffer_capacity: usize) -> Config {
    Config {
        mode: EngineMode::Mock,
        broker_credentials: None,
        symbols: vec![SYMBOL.to_string()],
        timeframe: Duration::from_secs(60),
        risk: RiskConfig::default(),
        // Long enough that the real-time decision tick never fires during a test;
        // every decision in these scenarios is driven by an explicit BarClose.
        decision_tick_period: Duration::from_secs(3600),
        suppression_ttl: ChronoDuration::minutes(15),
        reconnect: ReconnectPolicy::default(),
        buffer_capacity,
        minimum_bars,
        auto_execute: false,
    }
}

fn bar(open_time: i64, close: Decimal, halfspread: Decimal) -> Bar {
    Bar {
        symbol: SYMBOL.to_string(),
        open_time,
        open: close,
        high: close + halfspread,
        low: close - halfspread,
        close,
        volume: dec!(1000),
    }
}

/// 50 flat bars with an oversized high/low spread (so ATR is pinned by the
/// spread rather than by the eventual jump) followed by one bar whose close
/// jumps past both SMA20 and SMA50 of the flat window. Exactly
/// `TrendFollowing::warmup_bars()` (51) bars long. See DESIGN.md for why a
/// literal monotonic ramp can never trigger this strategy's golden cross.
fn trend_prefix_bars() -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..50).map(|i| bar(i, dec!(100), dec!(15))).collect();
    bars.push(bar(50, dec!(110), dec!(15)));
    bars
}

/// A 4-bar oscillation, a flat stretch, then a shallow decline — momentum
/// stays far from saturating, so this resolves to `Regime::Sideways` with a
/// comfortable margin while also tripping `MeanReversion`'s RSI/Bollinger
/// entry condition at the final bar.
fn sideways_bars() -> Vec<Bar> {
    let mut bars = Vec::new();
    for i in 0..40i64 {
        let price = match i % 4 {
            0 => dec!(100),
            1 => dec!(101),
            2 => dec!(100),
            _ => dec!(99),
        };
        bars.push(bar(i, price, dec!(0.2)));
    }
    for i in 40..54i64 {
        bars.push(bar(i, dec!(99.5), dec!(0.2)));
    }
    let decline = [
        dec!(99.2),
        dec!(98.9),
        dec!(98.6),
        dec!(98.3),
        dec!(98.0),
        dec!(97.7),
        dec!(97.4),
        dec!(97.1),
        dec!(96.8),
        dec!(96.5),
    ];
    for (k, price) in decline.iter().enumerate() {
        bars.push(bar(54 + k as i64, *price, dec!(0.2)));
    }
    bars
}

async fn spawn_engine(
    cfg: Config,
) -> (EngineHandle, broadcast::Receiver<EngineEvent>, Arc<MockMarketData>, Arc<MockBroker>, Arc<TestClock>) {
    let clock = Arc::new(TestClock::new(Utc::now()));
    let market_data = Arc::new(MockMarketData::new(cfg.buffer_capacity));
    let broker = Arc::new(MockBroker::new(AccountSnapshot {
        portfolio_value: cfg.risk.capital,
        cash: cfg.risk.capital,
        buying_power: cfg.risk.capital,
        open_positions: Vec::new(),
    }));
    broker.set_fill_price(dec!(100));

    let engine = TradingEngine::new(cfg, clock.clone(), market_data.clone(), broker.clone());
    let (handle, events) = engine.start().await.expect("engine starts");
    handle.start().await.expect("start command accepted");
    // StreamWorker subscribes to market_data from its own spawned task; give
    // the executor a moment to run it before any test pushes a bar, or the
    // push is a silent no-op against an unsubscribed MockMarketData.
    tokio::time::sleep(Duration::from_millis(20)).await;
    (handle, events, market_data, broker, clock)
}

/// Drains whatever the engine has already broadcast, using a short
/// real-time timeout — the workers run on the real tokio executor even
/// though their business-logic clock is a `TestClock`.
async fn drain(events: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_millis(150), events.recv()).await {
            Ok(Ok(event)) => out.push(event),
            _ => break,
        }
    }
    out
}

async fn push_bar(market_data: &MockMarketData, events: &mut broadcast::Receiver<EngineEvent>, b: Bar) -> Vec<EngineEvent> {
    market_data.push(StreamEvent::BarClose(b)).await;
    drain(events).await
}

fn find_recommendation(events: &[EngineEvent], side: Side, strategy: &str) -> Option<Recommendation> {
    events.iter().find_map(|e| match e {
        EngineEvent::Recommendation(r) if r.side == side && r.strategy_name == strategy => Some(r.clone()),
        _ => None,
    })
}

// S1 — engine lifecycle: warms up, then moves past Initializing once enough
// bars are buffered, and shuts down cleanly on command.
#[tokio::test]
async fn engine_warms_up_then_leaves_initializing_state() {
    let cfg = test_config(20, 200);
    let (handle, mut events, market_data, _broker, _clock) = spawn_engine(cfg).await;

    for i in 0..19 {
        let evs = push_bar(&market_data, &mut events, bar(i, dec!(100), dec!(0.5))).await;
        assert!(
            evs.iter().any(|e| matches!(e, EngineEvent::Status(s) if s.code == StatusCode::Initializing)),
            "expected an Initializing status while below minimum_bars"
        );
    }

    let evs = push_bar(&market_data, &mut events, bar(19, dec!(100), dec!(0.5))).await;
    assert!(
        evs.iter().any(|e| matches!(e, EngineEvent::Status(s) if s.code != StatusCode::Initializing)),
        "expected the engine to leave Initializing once minimum_bars is reached"
    );

    handle.stop(Duration::from_secs(1)).await.expect("stop succeeds");
}

// S2 — a clean trend triggers TrendFollowing's golden cross and resolves the
// regime classifier to Trend (asserted as the argmax, not a hard >=0.5
// confidence threshold; see DESIGN.md).
#[test]
fn trend_jump_resolves_to_trend_as_argmax() {
    let bars = trend_prefix_bars();
    let reading = RegimeClassifier::default().classify(&bars, Utc::now());
    assert_eq!(reading.regime, Regime::Trend);
    assert!(reading.confidence_trend > reading.confidence_sideways);
    assert!(reading.confidence_trend > reading.confidence_volatile);
}

#[tokio::test]
async fn trend_regime_produces_trend_following_buy() {
    let cfg = test_config(20, 200);
    let (handle, mut events, market_data, _broker, _clock) = spawn_engine(cfg).await;

    let mut all_events = Vec::new();
    for b in trend_prefix_bars() {
        all_events.extend(push_bar(&market_data, &mut events, b).await);
    }

    let rec = find_recommendation(&all_events, Side::Buy, "TrendFollowing")
        .expect("expected a TrendFollowing buy recommendation");
    assert_eq!(rec.regime, Regime::Trend);
    assert!(rec.suggested_qty > Decimal::ZERO);

    handle.stop(Duration::from_secs(1)).await.expect("stop succeeds");
}

// S3 — a 4-bar oscillation settling into a shallow decline resolves to
// Sideways with a comfortable margin and trips MeanReversion's oversold
// entry.
#[test]
fn oscillation_then_decline_resolves_to_sideways() {
    let bars = sideways_bars();
    let reading = RegimeClassifier::default().classify(&bars, Utc::now());
    assert_eq!(reading.regime, Regime::Sideways);
    assert!(reading.confidence_sideways > reading.confidence_trend);
    assert!(reading.confidence_sideways > reading.confidence_volatile);
}

#[tokio::test]
async fn sideways_regime_produces_mean_reversion_buy() {
    let cfg = test_config(20, 200);
    let (handle, mut events, market_data, _broker, _clock) = spawn_engine(cfg).await;

    let mut all_events = Vec::new();
    for b in sideways_bars() {
        all_events.extend(push_bar(&market_data, &mut events, b).await);
    }

    let rec = find_recommendation(&all_events, Side::Buy, "MeanReversion")
        .expect("expected a MeanReversion buy recommendation");
    assert_eq!(rec.regime, Regime::Sideways);

    handle.stop(Duration::from_secs(1)).await.expect("stop succeeds");
}

// S4 — skipping a recommendation suppresses the same (strategy, regime,
// side) signal until the TTL elapses, then it can fire again.
#[tokio::test]
async fn skipped_signal_is_suppressed_until_ttl_elapses() {
    let cfg = test_config(20, 200);
    let (handle, mut events, market_data, _broker, clock) = spawn_engine(cfg).await;

    let mut signal_id: Option<Uuid> = None;
    let mut last_price = Decimal::ZERO;
    let mut next_time = 0i64;

    for b in sideways_bars() {
        last_price = b.close;
        next_time = b.open_time + 1;
        let evs = push_bar(&market_data, &mut events, b).await;
        if let Some(rec) = find_recommendation(&evs, Side::Buy, "MeanReversion") {
            signal_id = Some(rec.signal_id);
            break;
        }
    }
    let signal_id = signal_id.expect("expected a MeanReversion buy signal within the sideways sequence");

    handle.skip(signal_id).await.expect("skip accepted");
    let _ = drain(&mut events).await;

    for _ in 0..5 {
        last_price -= dec!(0.3);
        let evs = push_bar(&market_data, &mut events, bar(next_time, last_price, dec!(0.2))).await;
        next_time += 1;
        assert!(
            find_recommendation(&evs, Side::Buy, "MeanReversion").is_none(),
            "signal should stay suppressed inside the TTL window"
        );
        assert!(
            evs.iter().any(|e| matches!(e, EngineEvent::Status(s) if s.code == StatusCode::SignalSuppressed)),
            "expected a SignalSuppressed status while the cooldown is active"
        );
    }

    clock.advance(Duration::from_secs(15 * 60 + 1));

    last_price -= dec!(0.3);
    let evs = push_bar(&market_data, &mut events, bar(next_time, last_price, dec!(0.2))).await;
    assert!(
        find_recommendation(&evs, Side::Buy, "MeanReversion").is_some(),
        "signal should re-emit once the suppression TTL has elapsed"
    );

    handle.stop(Duration::from_secs(1)).await.expect("stop succeeds");
}

// S5 — once the regime flips from Sideways to Trend, MeanReversion's
// suitability for Trend (0.3) is unconditionally below 0.5, so the selector
// switches to TrendFollowing without needing a precise hysteresis margin.
#[tokio::test]
async fn regime_change_switches_from_mean_reversion_to_trend_following() {
    let cfg = test_config(20, 200);
    let (handle, mut events, market_data, _broker, _clock) = spawn_engine(cfg).await;

    let mut all_events = Vec::new();
    for b in trend_prefix_bars() {
        all_events.extend(push_bar(&market_data, &mut events, b).await);
    }

    let switch = all_events
        .iter()
        .find_map(|e| match e {
            EngineEvent::Switch(s) if s.to == "TrendFollowing" => Some(s.clone()),
            _ => None,
        })
        .expect("expected a switch to TrendFollowing");
    assert_eq!(switch.from, "MeanReversion");
    assert_eq!(switch.reason, SwitchReason::ScoreImprovement);
    assert_eq!(switch.regime, Regime::Trend);

    handle.stop(Duration::from_secs(1)).await.expect("stop succeeds");
}

// S6 — a signal that passes local risk sizing can still be rejected by the
// broker at the execution stage; that is a distinct, downstream failure from
// a RiskReject and must surface its own status event.
#[tokio::test]
async fn broker_rejection_is_surfaced_after_local_risk_approval() {
    let cfg = test_config(20, 200);
    let (handle, mut events, market_data, broker, _clock) = spawn_engine(cfg).await;
    broker.set_reject_next(true);

    let mut signal_id = None;
    for b in trend_prefix_bars() {
        let evs = push_bar(&market_data, &mut events, b).await;
        if let Some(rec) = find_recommendation(&evs, Side::Buy, "TrendFollowing") {
            signal_id = Some(rec.signal_id);
        }
    }
    let signal_id = signal_id.expect("expected a TrendFollowing buy recommendation to risk-size successfully");

    handle.accept(signal_id).await.expect("accept command accepted");
    let evs = drain(&mut events).await;

    assert!(
        evs.iter().any(|e| matches!(
            e,
            EngineEvent::Status(s) if s.code == StatusCode::OrderRejected && s.message.contains("rejected:")
        )),
        "expected a broker-level order rejection status"
    );

    let account = broker.account_snapshot();
    assert!(account.open_positions.is_empty(), "a rejected order must not open a position");

    handle.stop(Duration::from_secs(1)).await.expect("stop succeeds");
}
