use super::scoring::{
    blend_factors, confidence_from_score, confluence_bonus, decide, missing_required_penalty,
    no_trade_result, position_size, reality_adjustment, RealityInputs, Sizing, Thresholds,
    WeightedFactor,
};
use super::{validate_inputs, SignalBuilder, SignalEngine};
use crate::error::Result;
use crate::features::{multi_horizon_momentum, realized_vol_pct};
use crate::models::{
    EngineMetadata, EngineTier, FundamentalSet, IndicatorSet, MacroRegime, MarketContext,
    MarketData, Signal, SignalResult,
};

/// Valuation-driven engine over a months-long horizon.
///
/// Blends additive fundamental sub-scores (earnings multiple, PEG, margins,
/// revenue growth) with a half-year price trend. The sub-score ranges and the
/// ±0.2 decision thresholds are calibration, not gospel: they live in
/// `ValueConfig` precisely so they can be tuned.
#[derive(Debug)]
pub struct ValueEngine {
    config: ValueConfig,
}

#[derive(Debug)]
pub struct ValueConfig {
    /// P/E at or below this scores full value credit
    pub cheap_pe: f64,
    /// P/E above this scores the maximum expensive penalty
    pub rich_pe: f64,
    /// PEG below this scores full growth-at-a-reasonable-price credit
    pub cheap_peg: f64,
    pub rich_peg: f64,
    pub strong_margin: f64,
    pub weak_margin: f64,
    pub strong_revenue_growth: f64,
    /// Additive composite beyond ±this moves the needle
    pub value_threshold: f64,
    pub confidence_min: f64,
    pub base_size_pct: f64,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            cheap_pe: 15.0,
            rich_pe: 35.0,
            cheap_peg: 1.0,
            rich_peg: 2.5,
            strong_margin: 0.20,
            weak_margin: 0.05,
            strong_revenue_growth: 0.15,
            value_threshold: 0.2,
            confidence_min: 0.6,
            base_size_pct: 12.0,
        }
    }
}

impl Default for ValueEngine {
    fn default() -> Self {
        Self {
            config: ValueConfig::default(),
        }
    }
}

impl ValueEngine {
    pub fn new(config: ValueConfig) -> Self {
        Self { config }
    }

    /// Earnings-multiple sub-score, roughly [-0.2, 0.3]
    fn pe_score(&self, fundamentals: &FundamentalSet) -> (Option<f64>, String) {
        let Some(pe) = fundamentals.get("pe_ratio") else {
            return (None, "pe_ratio not supplied".to_string());
        };
        if pe <= 0.0 {
            return (Some(-0.1), format!("negative earnings (pe {:.1})", pe));
        }
        let score = if pe <= self.config.cheap_pe {
            0.3
        } else if pe >= self.config.rich_pe {
            -0.2
        } else {
            // Linear between cheap and rich
            let t = (pe - self.config.cheap_pe) / (self.config.rich_pe - self.config.cheap_pe);
            0.3 - t * 0.5
        };
        (Some(score), format!("pe {:.1}", pe))
    }

    /// PEG-style sub-score, guarded by growth > 0; roughly [-0.1, 0.3]
    fn peg_score(&self, fundamentals: &FundamentalSet) -> (Option<f64>, String) {
        let pe = fundamentals.get("pe_ratio");
        let growth = fundamentals.get("earnings_growth");
        match (pe, growth) {
            (Some(pe), Some(growth)) if growth > 0.0 && pe > 0.0 => {
                let peg = pe / (growth * 100.0);
                let score = if peg <= self.config.cheap_peg {
                    0.3
                } else if peg >= self.config.rich_peg {
                    -0.1
                } else {
                    let t = (peg - self.config.cheap_peg)
                        / (self.config.rich_peg - self.config.cheap_peg);
                    0.3 - t * 0.4
                };
                (Some(score), format!("peg {:.2}", peg))
            }
            (Some(_), Some(growth)) => (
                Some(0.0),
                format!("peg undefined (growth {:+.1}%)", growth * 100.0),
            ),
            _ => (None, "pe/growth not supplied".to_string()),
        }
    }

    fn margin_score(&self, fundamentals: &FundamentalSet) -> (Option<f64>, String) {
        let Some(margin) = fundamentals.get("net_margin") else {
            return (None, "net_margin not supplied".to_string());
        };
        let score = if margin >= self.config.strong_margin {
            0.2
        } else if margin < self.config.weak_margin {
            -0.1
        } else {
            0.05
        };
        (Some(score), format!("net margin {:.1}%", margin * 100.0))
    }

    fn revenue_score(&self, fundamentals: &FundamentalSet) -> (Option<f64>, String) {
        let Some(growth) = fundamentals.get("revenue_growth") else {
            return (None, "revenue_growth not supplied".to_string());
        };
        let score = if growth >= self.config.strong_revenue_growth {
            0.3
        } else if growth < 0.0 {
            -0.2
        } else {
            growth / self.config.strong_revenue_growth * 0.3
        };
        (Some(score), format!("revenue growth {:+.1}%", growth * 100.0))
    }
}

impl SignalEngine for ValueEngine {
    fn generate_signal(
        &self,
        symbol: &str,
        market_data: &MarketData,
        indicators: &IndicatorSet,
        fundamentals: &FundamentalSet,
        context: &MarketContext,
    ) -> Result<SignalResult> {
        validate_inputs("value", symbol, market_data, self.min_bars())?;

        if context.regime == MacroRegime::NoTrade {
            return Ok(no_trade_result(self.metadata(), symbol, context));
        }

        let closes: Vec<f64> = market_data.candles.iter().map(|c| c.close).collect();
        let current_price = *closes.last().unwrap_or(&0.0);

        // Stage A for this horizon is the fundamental composite itself plus a
        // half-year trend gate; the additive sub-scores sum into [-1,1]-ish
        let (pe, pe_note) = self.pe_score(fundamentals);
        let (peg, peg_note) = self.peg_score(fundamentals);
        let (margin, margin_note) = self.margin_score(fundamentals);
        let (revenue, revenue_note) = self.revenue_score(fundamentals);

        let composite: f64 = [pe, peg, margin, revenue].iter().flatten().sum();
        let valuation_label = if composite > self.config.value_threshold {
            "undervalued"
        } else if composite < -self.config.value_threshold {
            "overvalued"
        } else {
            "fairly valued"
        };

        let trend = multi_horizon_momentum(&closes, &[(63, 0.5), (126, 0.5)]);
        let trend_value = trend.unwrap_or(0.0);

        // Composite spans roughly [-0.6, 1.1]; normalise into factor range
        let valuation_factor = if fundamentals.is_empty() {
            None
        } else {
            Some((composite / 0.6).clamp(-1.0, 1.0))
        };

        let blended = blend_factors(&[
            WeightedFactor {
                name: "valuation",
                weight: 0.6,
                score: valuation_factor,
                note: format!("composite {:+.2} ({})", composite, valuation_label),
            },
            WeightedFactor {
                name: "long_trend",
                weight: 0.4,
                score: trend,
                note: format!("63/126-bar trend {:+.2}", trend_value),
            },
        ]);

        let mut confidence = confidence_from_score(blended.score);
        let (penalty, penalty_note) =
            missing_required_penalty(&self.required_indicators(), indicators);
        confidence *= penalty;

        let signal = decide(
            blended.score,
            confidence,
            &Thresholds {
                confidence_min: self.config.confidence_min,
                dead_zone: self.config.value_threshold / 2.0,
            },
        );
        let (confidence, confluence_note) =
            confluence_bonus(confidence, blended.score, blended.agreeing, blended.active);

        let vol = realized_vol_pct(&market_data.candles, 14).unwrap_or(0.0);
        let sizing = Sizing {
            base_size_pct: self.config.base_size_pct,
            // Macro regime is the only regime this horizon respects
            regime_multiplier: match context.regime {
                MacroRegime::Bull => 1.1,
                MacroRegime::Bear => 0.8,
                MacroRegime::HighVolChop => 0.6,
                MacroRegime::NoTrade => 0.0,
            },
            regime_ceiling_pct: 15.0,
        };
        let sized = position_size(signal, confidence, &sizing);

        let reality = RealityInputs {
            vix: context.vix,
            iv_percentile: indicators.get("iv_percentile"),
            bb_width: indicators.get("bb_width"),
            realized_vol_pct: vol,
            momentum: trend_value,
        };
        let (final_size, reality_notes) = reality_adjustment(sized, &reality);

        let mut builder = SignalBuilder::new(self.metadata(), symbol)
            .signal(signal)
            .confidence(confidence)
            .position_size_pct(final_size)
            .reason(format!(
                "Valuation read: {} (composite {:+.2}; {}, {}, {}, {})",
                valuation_label, composite, pe_note, peg_note, margin_note, revenue_note
            ))
            .reasons(blended.reasons)
            .metadata_entry("valuation_composite", format!("{:.3}", composite))
            .metadata_entry("score", format!("{:.3}", blended.score));

        if let Some(note) = penalty_note {
            builder = builder.reason(note);
        }
        if let Some(note) = confluence_note {
            builder = builder.reason(note);
        }
        builder = builder.reason(format!(
            "Sizing: base {:.1}% x confidence x macro regime -> {:.2}%",
            self.config.base_size_pct, final_size
        ));
        builder = builder.reasons(reality_notes);

        if signal == Signal::Buy {
            builder = builder
                .entry_range(current_price * 0.97, current_price * 1.02)
                .stop_loss(current_price * 0.85)
                .take_profits(
                    vec![current_price * 1.15, current_price * 1.30, current_price * 1.50],
                    current_price,
                );
        } else if signal == Signal::Sell {
            builder = builder
                .entry_range(current_price * 0.98, current_price * 1.03)
                .stop_loss(current_price * 1.12)
                .take_profits(vec![current_price * 0.85, current_price * 0.75], current_price);
        }

        Ok(builder.build())
    }

    fn metadata(&self) -> EngineMetadata {
        EngineMetadata {
            name: "value".to_string(),
            tier: EngineTier::Elite,
            timeframe: "3-6 months".to_string(),
            version: "0.9.0".to_string(),
            features: vec![
                "fundamental-composite".to_string(),
                "four-stage-pipeline".to_string(),
            ],
        }
    }

    fn required_indicators(&self) -> Vec<String> {
        vec!["sma_200".to_string()]
    }

    fn required_fundamentals(&self) -> Vec<String> {
        vec![
            "pe_ratio".to_string(),
            "earnings_growth".to_string(),
            "net_margin".to_string(),
            "revenue_growth".to_string(),
        ]
    }

    fn min_bars(&self) -> usize {
        126
    }
}
