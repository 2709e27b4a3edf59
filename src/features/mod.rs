// Engineered features computed from candle tails
// Raw indicator values (rsi, macd, ...) arrive from the external data layer;
// these are the series features engines derive themselves every call.

pub mod correlation;
pub mod momentum;
pub mod moving_average;
pub mod range;
pub mod volatility;

pub use correlation::{daily_returns, pearson_correlation};
pub use momentum::{multi_horizon_momentum, rate_of_change};
pub use moving_average::{calculate_ema, calculate_sma};
pub use range::{detect_breakout, range_stats, Breakout, RangeStats};
pub use volatility::{realized_vol_pct, realized_vol_series, vol_expansion_ratio};
