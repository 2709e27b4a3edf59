/// Shared four-stage scoring pipeline pieces.
///
/// Every concrete engine runs the same shape: regime classification (stage A,
/// engine-specific), a weighted direction/confidence blend (B), allocation
/// sizing (C), and downside-only reality adjustments (D). The helpers here
/// keep stages B-D consistent across engines; the per-engine character lives
/// in the factor scores and fixed weights each engine feeds in.
use crate::engine::SignalBuilder;
use crate::models::{
    EngineMetadata, IndicatorSet, MarketContext, Signal, SignalResult,
};

/// One stage-B factor: a score in [-1,1] or None when the inputs for it were
/// unavailable (missing data degrades the contribution to zero, it never
/// fails the call).
pub struct WeightedFactor {
    pub name: &'static str,
    pub weight: f64,
    pub score: Option<f64>,
    pub note: String,
}

/// Outcome of the stage-B blend
pub struct DirectionScore {
    /// Weighted continuous score in [-1,1]
    pub score: f64,
    /// One narrative line per factor, in execution order
    pub reasons: Vec<String>,
    /// Factors agreeing with the sign of the total
    pub agreeing: usize,
    /// Factors that had data
    pub active: usize,
}

/// Combine independently-scored factors via fixed per-engine weights.
///
/// Unavailable factors keep their weight in the denominator so sparse inputs
/// read as weak evidence, not strong evidence from whatever was left.
pub fn blend_factors(factors: &[WeightedFactor]) -> DirectionScore {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut reasons = Vec::with_capacity(factors.len());
    let mut active_scores = Vec::new();

    for factor in factors {
        total_weight += factor.weight;
        match factor.score {
            Some(score) => {
                let clamped = score.clamp(-1.0, 1.0);
                weighted_sum += clamped * factor.weight;
                active_scores.push(clamped);
                reasons.push(format!(
                    "{}: {:+.2} (weight {:.2}) - {}",
                    factor.name, clamped, factor.weight, factor.note
                ));
            }
            None => {
                tracing::debug!(factor = factor.name, "factor unavailable, contributing zero");
                reasons.push(format!("{}: unavailable, contributing zero", factor.name));
            }
        }
    }

    let score = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    };

    let agreeing = active_scores
        .iter()
        .filter(|s| s.signum() == score.signum() && s.abs() > 0.05)
        .count();

    DirectionScore {
        score,
        reasons,
        agreeing,
        active: active_scores.len(),
    }
}

/// Map a [-1,1] direction score to confidence centered at 0.5
pub fn confidence_from_score(score: f64) -> f64 {
    (0.5 + score.abs() / 2.0).clamp(0.0, 1.0)
}

/// Declared-required indicators that are missing reduce confidence,
/// they never hard-fail the engine. Returns (multiplier, narrative).
pub fn missing_required_penalty(
    required: &[String],
    indicators: &IndicatorSet,
) -> (f64, Option<String>) {
    let missing: Vec<&str> = required
        .iter()
        .filter(|key| !indicators.contains(key))
        .map(|key| key.as_str())
        .collect();

    if missing.is_empty() {
        return (1.0, None);
    }

    tracing::warn!(missing = ?missing, "required indicators absent, reducing confidence");
    let multiplier = 0.9f64.powi(missing.len() as i32);
    (
        multiplier,
        Some(format!(
            "Missing required indicators ({}): confidence reduced x{:.2}",
            missing.join(", "),
            multiplier
        )),
    )
}

/// Post-hoc confluence bonus when independent factors agree on direction.
/// At most +0.1, and the boosted confidence never exceeds 0.9.
pub fn confluence_bonus(
    confidence: f64,
    score: f64,
    agreeing: usize,
    active: usize,
) -> (f64, Option<String>) {
    if active < 3 || score.abs() < 0.05 {
        return (confidence, None);
    }
    let ratio = agreeing as f64 / active as f64;
    if ratio < 0.75 {
        return (confidence, None);
    }

    let bonus = (0.03 * agreeing as f64).min(0.1);
    let boosted = (confidence + bonus).min(0.9);
    if boosted <= confidence {
        return (confidence, None);
    }

    (
        boosted,
        Some(format!(
            "Confluence: {}/{} factors agree, confidence +{:.2}",
            agreeing,
            active,
            boosted - confidence
        )),
    )
}

/// Per-engine decision thresholds
pub struct Thresholds {
    /// Confidence floor for a non-Hold call
    pub confidence_min: f64,
    /// Score magnitude below this is noise
    pub dead_zone: f64,
}

/// Final signal: BUY needs confidence above the engine threshold AND score
/// beyond the positive dead-zone; SELL is symmetric; otherwise HOLD.
pub fn decide(score: f64, confidence: f64, thresholds: &Thresholds) -> Signal {
    if confidence > thresholds.confidence_min && score > thresholds.dead_zone {
        Signal::Buy
    } else if confidence > thresholds.confidence_min && score < -thresholds.dead_zone {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Stage-C sizing parameters; the ceiling is regime-specific
pub struct Sizing {
    pub base_size_pct: f64,
    pub regime_multiplier: f64,
    pub regime_ceiling_pct: f64,
}

/// `base × confidence multiplier × regime multiplier`, clamped to the regime
/// ceiling. Hold sizes to zero; Sell comes out negative.
pub fn position_size(signal: Signal, confidence: f64, sizing: &Sizing) -> f64 {
    if signal == Signal::Hold {
        return 0.0;
    }

    // 0.5 confidence is neutral leverage, 1.0 doubles the base
    let confidence_multiplier = (confidence * 2.0).clamp(0.0, 2.0);
    let magnitude = (sizing.base_size_pct * confidence_multiplier * sizing.regime_multiplier)
        .clamp(0.0, sizing.regime_ceiling_pct);

    match signal {
        Signal::Buy => magnitude,
        Signal::Sell => -magnitude,
        Signal::Hold => 0.0,
    }
}

/// Inputs to the stage-D reality check, gathered independently of stages A/B
pub struct RealityInputs {
    pub vix: f64,
    /// Implied-vol percentile from the indicator map, if present
    pub iv_percentile: Option<f64>,
    /// Bollinger width from the indicator map, if present
    pub bb_width: Option<f64>,
    /// Realized vol as fraction of price
    pub realized_vol_pct: f64,
    /// Stage-B momentum reading
    pub momentum: f64,
}

const ELEVATED_VIX: f64 = 28.0;
const ELEVATED_IV_PERCENTILE: f64 = 0.8;
const SQUEEZE_BB_WIDTH: f64 = 0.04;
const CHOP_VOL_THRESHOLD: f64 = 0.03;
const CHOP_MOMENTUM_BAND: f64 = 0.1;

/// Downside-only multiplicative penalties for adverse conditions.
/// Adjustments only shrink size, never grow it.
pub fn reality_adjustment(size: f64, inputs: &RealityInputs) -> (f64, Vec<String>) {
    let mut adjusted = size;
    let mut reasons = Vec::new();

    let iv_elevated = inputs.vix > ELEVATED_VIX
        || inputs
            .iv_percentile
            .map(|p| p > ELEVATED_IV_PERCENTILE)
            .unwrap_or(false);
    if iv_elevated {
        adjusted *= 0.7;
        reasons.push(format!(
            "Reality check: elevated implied volatility (VIX {:.1}), size x0.70",
            inputs.vix
        ));
    }

    if let Some(bb_width) = inputs.bb_width {
        if bb_width < SQUEEZE_BB_WIDTH && bb_width > 0.0 {
            adjusted *= 0.8;
            reasons.push(format!(
                "Reality check: volatility squeeze (bb_width {:.3}), size x0.80",
                bb_width
            ));
        }
    }

    if inputs.realized_vol_pct > CHOP_VOL_THRESHOLD && inputs.momentum.abs() < CHOP_MOMENTUM_BAND {
        adjusted *= 0.5;
        reasons.push(format!(
            "Reality check: high volatility with near-zero momentum (vol {:.1}%), size x0.50",
            inputs.realized_vol_pct * 100.0
        ));
    }

    // Never grow
    if adjusted.abs() > size.abs() {
        adjusted = size;
    }

    (adjusted, reasons)
}

/// NO_TRADE short-circuit: when the macro regime says stand down, every
/// engine returns HOLD at minimal confidence before stages B-D run, with
/// that fact as the first reasoning line.
pub fn no_trade_result(
    metadata: EngineMetadata,
    symbol: &str,
    context: &MarketContext,
) -> SignalResult {
    SignalBuilder::new(metadata, symbol)
        .signal(Signal::Hold)
        .confidence(0.05)
        .reason(format!(
            "Macro regime NO_TRADE (confidence {:.2}): standing down before scoring",
            context.regime_confidence
        ))
        .build()
}
