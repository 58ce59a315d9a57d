pub mod mock_broker;
pub mod mock_market_data;
pub mod test_clock;

pub use mock_broker::MockBroker;
pub use mock_market_data::MockMarketData;
pub use test_clock::TestClock;
