/// Symbol-to-engine routing, decided by symbol identity alone.
///
/// Independent of the aggregator: callers who want one opinion rather than a
/// consensus ask the selector which single engine fits the instrument. The
/// rule is deterministic so routing can be reasoned about offline.
use crate::models::EngineTier;

/// Daily-rebalanced 3x leveraged ETFs. These erode value in chop, so they
/// route to the decay-aware engine rather than the generic swing engine.
const LEVERAGED_TICKERS: &[&str] = &[
    "TQQQ", "SQQQ", "UPRO", "SPXU", "SPXL", "SPXS", "SOXL", "SOXS", "TNA", "TZA", "LABU", "LABD",
    "FNGU", "FNGD", "TECL", "TECS", "UDOW", "SDOW",
];

/// A routing decision with its audit trail
#[derive(Debug, Clone)]
pub struct EngineChoice {
    pub engine_name: String,
    pub rationale: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EngineSelector;

impl EngineSelector {
    pub fn new() -> Self {
        Self
    }

    /// Route a symbol to exactly one engine variant
    pub fn select(&self, symbol: &str) -> EngineChoice {
        let normalized = Self::normalize(symbol);
        if Self::is_leveraged(&normalized) {
            EngineChoice {
                engine_name: "leveraged".to_string(),
                rationale: format!(
                    "{} is a daily-rebalanced leveraged ETF; routing to the decay-aware engine",
                    normalized
                ),
                warnings: vec![
                    "Leveraged instruments erode value in range-bound chop; expect hard vetoes"
                        .to_string(),
                ],
            }
        } else {
            EngineChoice {
                engine_name: "swing".to_string(),
                rationale: format!("{} is an unleveraged instrument; routing to swing", normalized),
                warnings: Vec::new(),
            }
        }
    }

    /// Does this symbol belong with this engine variant?
    pub fn is_compatible(&self, symbol: &str, engine_name: &str) -> bool {
        let leveraged = Self::is_leveraged(&Self::normalize(symbol));
        match engine_name.to_lowercase().as_str() {
            // The decay-aware engine assumes 3x daily rebalancing
            "leveraged" => leveraged,
            // Generic engines handle anything unleveraged
            "swing" | "momentum" | "value" => !leveraged,
            _ => false,
        }
    }

    /// Mismatched routings the caller asked for anyway, spelled out
    pub fn compatibility_warnings(&self, symbol: &str, engine_name: &str) -> Vec<String> {
        if self.is_compatible(symbol, engine_name) {
            return Vec::new();
        }
        let normalized = Self::normalize(symbol);
        if Self::is_leveraged(&normalized) {
            vec![format!(
                "{} is a leveraged ETF; engine '{}' does not model daily-rebalance decay",
                normalized, engine_name
            )]
        } else {
            vec![format!(
                "{} is not a leveraged ETF; engine '{}' will misread its volatility profile",
                normalized, engine_name
            )]
        }
    }

    /// Minimum tier needed to run the engine this selector would choose
    pub fn required_tier(&self, symbol: &str) -> EngineTier {
        if Self::is_leveraged(&Self::normalize(symbol)) {
            EngineTier::Elite
        } else {
            EngineTier::Pro
        }
    }

    fn is_leveraged(normalized: &str) -> bool {
        LEVERAGED_TICKERS.contains(&normalized)
    }

    fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }
}
