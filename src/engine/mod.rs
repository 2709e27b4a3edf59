// Scoring engines and their shared plumbing
pub mod builder;
pub mod factory;
pub mod leveraged;
pub mod momentum;
pub mod scoring;
pub mod selector;
pub mod swing;
pub mod value;

pub use builder::SignalBuilder;
pub use factory::EngineFactory;
pub use selector::EngineSelector;

use crate::error::{EngineError, Result};
use crate::models::{
    EngineMetadata, FundamentalSet, IndicatorSet, MarketContext, MarketData, SignalResult,
};

/// Capability contract every scoring engine implements.
///
/// `generate_signal` is a pure function of its inputs (aside from wall-clock
/// timestamps): no I/O, no per-call mutable state, safe to share one instance
/// across threads once built.
pub trait SignalEngine: Send + Sync + std::fmt::Debug {
    /// Produce one recommendation for one symbol in one cycle.
    ///
    /// Preconditions: non-empty symbol and at least `min_bars` time-ordered
    /// candles; violations come back as `InsufficientData` naming engine and
    /// symbol. Any internal scoring failure surfaces as `ModelPrediction`.
    fn generate_signal(
        &self,
        symbol: &str,
        market_data: &MarketData,
        indicators: &IndicatorSet,
        fundamentals: &FundamentalSet,
        context: &MarketContext,
    ) -> Result<SignalResult>;

    /// Static descriptor, callable without an evaluation context
    fn metadata(&self) -> EngineMetadata;

    /// Indicator keys this engine wants from the data layer.
    /// Missing keys reduce confidence; they never hard-fail a call.
    fn required_indicators(&self) -> Vec<String>;

    /// Fundamental keys this engine wants from the data layer
    fn required_fundamentals(&self) -> Vec<String> {
        Vec::new()
    }

    /// Minimum lookback in bars
    fn min_bars(&self) -> usize;
}

/// Shared precondition check, called at the top of every engine
pub fn validate_inputs(
    engine: &str,
    symbol: &str,
    market_data: &MarketData,
    min_bars: usize,
) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(EngineError::insufficient_data(
            engine,
            symbol,
            "empty symbol",
        ));
    }
    if market_data.candles.len() < min_bars {
        return Err(EngineError::insufficient_data(
            engine,
            symbol,
            format!(
                "{} candles, need {}",
                market_data.candles.len(),
                min_bars
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candle;
    use chrono::Utc;

    fn data_with_bars(count: usize) -> MarketData {
        let candles = (0..count)
            .map(|i| Candle {
                symbol: "TEST".to_string(),
                timestamp: Utc::now() + chrono::Duration::days(i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1000.0,
            })
            .collect();
        MarketData::new(candles)
    }

    #[test]
    fn test_validate_rejects_empty_symbol() {
        let err = validate_inputs("swing", "  ", &data_with_bars(60), 20).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { .. }));
        assert!(err.to_string().contains("empty symbol"));
    }

    #[test]
    fn test_validate_rejects_short_series() {
        let err = validate_inputs("swing", "AAPL", &data_with_bars(5), 20).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("swing"));
        assert!(msg.contains("AAPL"));
        assert!(msg.contains("need 20"));
    }

    #[test]
    fn test_validate_accepts_sufficient_series() {
        assert!(validate_inputs("swing", "AAPL", &data_with_bars(20), 20).is_ok());
    }
}
