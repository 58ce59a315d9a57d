pub mod control;
pub mod engine;
pub mod events;
pub mod workers;

pub use control::EngineHandle;
pub use engine::TradingEngine;
