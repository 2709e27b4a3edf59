use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// OHLCV candlestick data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Trading signal
///
/// Variant order matters: majority-vote ties in the aggregator resolve to the
/// earliest variant among the tied set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    Buy,
    Hold,
    Sell,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Hold => "HOLD",
            Signal::Sell => "SELL",
        }
    }
}

/// Macro market regime, classified externally once per decision cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MacroRegime {
    Bull,
    Bear,
    HighVolChop,
    NoTrade,
}

impl MacroRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacroRegime::Bull => "BULL",
            MacroRegime::Bear => "BEAR",
            MacroRegime::HighVolChop => "HIGH_VOL_CHOP",
            MacroRegime::NoTrade => "NO_TRADE",
        }
    }
}

/// Per-cycle macro market snapshot
///
/// Produced once externally per decision cycle and shared read-only across
/// every symbol/engine evaluated in that cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub regime: MacroRegime,
    /// Classifier's confidence in the regime label, 0.0-1.0
    pub regime_confidence: f64,
    pub vix: f64,
    pub nasdaq_trend: String,
    pub sector_rotation: HashMap<String, f64>,
    /// Advance/decline breadth, 0.0-1.0
    pub breadth: f64,
    /// 10y-2y spread in percentage points
    pub yield_curve_spread: f64,
    pub timestamp: DateTime<Utc>,
}

impl MarketContext {
    /// Neutral context for tools and tests: bull regime, calm vol
    pub fn neutral(timestamp: DateTime<Utc>) -> Self {
        Self {
            regime: MacroRegime::Bull,
            regime_confidence: 0.5,
            vix: 18.0,
            nasdaq_trend: "sideways".to_string(),
            sector_rotation: HashMap::new(),
            breadth: 0.5,
            yield_curve_spread: 0.5,
            timestamp,
        }
    }
}

/// Market data handed to an engine: the symbol's own candles plus optional
/// reference series for leverage-aware engines.
///
/// Reference series are bounded tails, aligned by calendar day with `candles`
/// where overlap exists. Engines that don't need them ignore them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub candles: Vec<Candle>,
    /// Underlying index series (e.g. QQQ for TQQQ)
    pub underlying: Option<Vec<Candle>>,
    /// Volatility index series (e.g. VIX)
    pub volatility_index: Option<Vec<Candle>>,
}

impl MarketData {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            underlying: None,
            volatility_index: None,
        }
    }

    pub fn with_reference_series(
        mut self,
        underlying: Vec<Candle>,
        volatility_index: Vec<Candle>,
    ) -> Self {
        self.underlying = Some(underlying);
        self.volatility_index = Some(volatility_index);
        self
    }
}

/// Flat indicator key→value map from the external data layer.
///
/// Missing keys are neutral: accessors return None and the caller degrades
/// that factor's contribution to zero rather than failing the call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    values: HashMap<String, f64>,
}

impl IndicatorSet {
    pub fn new(values: HashMap<String, f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Missing-is-neutral accessor
    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Flat fundamentals key→value map, same missing-is-neutral convention
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalSet {
    values: HashMap<String, f64>,
}

impl FundamentalSet {
    pub fn new(values: HashMap<String, f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Static access-control tier attached to engine metadata
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EngineTier {
    Basic,
    Pro,
    Elite,
}

impl EngineTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineTier::Basic => "BASIC",
            EngineTier::Pro => "PRO",
            EngineTier::Elite => "ELITE",
        }
    }
}

/// Static engine descriptor, callable without an evaluation context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineMetadata {
    pub name: String,
    pub tier: EngineTier,
    pub timeframe: String,
    pub version: String,
    pub features: Vec<String>,
}

impl EngineMetadata {
    /// Stub used when an engine's catalog entry cannot be built
    pub fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tier: EngineTier::Basic,
            timeframe: "UNKNOWN".to_string(),
            version: "UNKNOWN".to_string(),
            features: Vec::new(),
        }
    }
}

/// Per-symbol regime for swing-horizon engines, recomputed fresh every call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SwingRegime {
    TrendingUp,
    TrendingDown,
    RangeBound,
    VolatileChop,
    BreakoutUp,
    BreakoutDown,
}

impl SwingRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwingRegime::TrendingUp => "TRENDING_UP",
            SwingRegime::TrendingDown => "TRENDING_DOWN",
            SwingRegime::RangeBound => "RANGE_BOUND",
            SwingRegime::VolatileChop => "VOLATILE_CHOP",
            SwingRegime::BreakoutUp => "BREAKOUT_UP",
            SwingRegime::BreakoutDown => "BREAKOUT_DOWN",
        }
    }
}

/// Regime states for daily-rebalanced leveraged instruments.
///
/// Adds leverage-decay and volatility-spike states on top of the swing set;
/// both are terminal (zero size).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LeveragedRegime {
    TrendLowVol,
    TrendRisingVol,
    TrendDown,
    RangeQuiet,
    LeverageDecay,
    VolatilitySpike,
    Defensive,
}

impl LeveragedRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeveragedRegime::TrendLowVol => "TREND_LOW_VOL",
            LeveragedRegime::TrendRisingVol => "TREND_RISING_VOL",
            LeveragedRegime::TrendDown => "TREND_DOWN",
            LeveragedRegime::RangeQuiet => "RANGE_QUIET",
            LeveragedRegime::LeverageDecay => "LEVERAGE_DECAY",
            LeveragedRegime::VolatilitySpike => "VOLATILITY_SPIKE",
            LeveragedRegime::Defensive => "DEFENSIVE",
        }
    }

    /// Decay and spike states hard-veto any position
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeveragedRegime::LeverageDecay | LeveragedRegime::VolatilitySpike
        )
    }
}

/// Inclusive entry price range suggestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryRange {
    pub low: f64,
    pub high: f64,
}

/// One engine's recommendation for one symbol in one cycle.
///
/// Immutable once built; construct through `SignalBuilder` so engine
/// identity/version/tier stamping and the invariants (confidence clamp,
/// Hold ⇒ zero size, take-profit ordering) cannot diverge per engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalResult {
    pub signal_id: Uuid,
    pub engine_name: String,
    pub engine_version: String,
    pub engine_tier: EngineTier,
    pub symbol: String,
    pub signal: Signal,
    /// Self-reported certainty, clamped to [0,1]
    pub confidence: f64,
    /// Signed percent of portfolio; negative for short exposure
    pub position_size_pct: f64,
    pub timeframe: String,
    pub entry_range: Option<EntryRange>,
    pub stop_loss: Option<f64>,
    /// Ordered nearest-target-first
    pub take_profit: Vec<f64>,
    /// Ordered audit narrative: regime line first, then each stage in
    /// execution order
    pub reasoning: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub generated_at: DateTime<Utc>,
    /// Advisory, generated_at + 24h
    pub expires_at: DateTime<Utc>,
}

impl SignalResult {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Advisory validity window stamped on every result
pub const SIGNAL_TTL_HOURS: i64 = 24;

pub fn signal_expiry(generated_at: DateTime<Utc>) -> DateTime<Utc> {
    generated_at + Duration::hours(SIGNAL_TTL_HOURS)
}

/// Consensus across a batch of engines for one symbol.
///
/// `engine_results` contains exactly the engines that returned successfully;
/// failures are silently omitted (never null entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedSignalResult {
    pub symbol: String,
    pub consensus_signal: Signal,
    pub consensus_confidence: f64,
    pub recommended_engine: String,
    pub engine_results: HashMap<String, SignalResult>,
    pub conflicts: Vec<String>,
    pub combined_reasoning: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_tie_break_order() {
        // Buy sorts before Hold sorts before Sell
        let mut signals = vec![Signal::Sell, Signal::Buy, Signal::Hold];
        signals.sort();
        assert_eq!(signals, vec![Signal::Buy, Signal::Hold, Signal::Sell]);
    }

    #[test]
    fn test_indicator_set_missing_is_neutral() {
        let mut indicators = IndicatorSet::default();
        indicators.insert("rsi", 55.0);

        assert_eq!(indicators.get("rsi"), Some(55.0));
        assert_eq!(indicators.get("macd"), None);
        assert_eq!(indicators.get_or("macd", 0.0), 0.0);
    }

    #[test]
    fn test_signal_expiry_window() {
        let now = Utc::now();
        let expiry = signal_expiry(now);
        assert_eq!((expiry - now).num_hours(), 24);
    }

    #[test]
    fn test_leveraged_regime_terminal_states() {
        assert!(LeveragedRegime::LeverageDecay.is_terminal());
        assert!(LeveragedRegime::VolatilitySpike.is_terminal());
        assert!(!LeveragedRegime::TrendLowVol.is_terminal());
        assert!(!LeveragedRegime::Defensive.is_terminal());
    }

    #[test]
    fn test_unknown_metadata_stub() {
        let meta = EngineMetadata::unknown("broken");
        assert_eq!(meta.name, "broken");
        assert_eq!(meta.version, "UNKNOWN");
    }
}
