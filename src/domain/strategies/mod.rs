pub mod mean_reversion;
pub mod trend_following;
pub mod volatility_breakout;

pub use mean_reversion::MeanReversion;
pub use trend_following::TrendFollowing;
pub use volatility_breakout::VolatilityBreakout;

use crate::domain::strategy::Strategy;
use std::sync::Arc;

/// The three built-in strategies, keyed by name.
pub fn default_strategy_set() -> Vec<Arc<dyn Strategy>> {
    vec![
        Arc::new(TrendFollowing::default()),
        Arc::new(MeanReversion::default()),
        Arc::new(VolatilityBreakout::default()),
    ]
}
