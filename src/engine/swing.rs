use super::scoring::{
    blend_factors, confidence_from_score, confluence_bonus, decide, missing_required_penalty,
    no_trade_result, position_size, reality_adjustment, RealityInputs, Sizing, Thresholds,
    WeightedFactor,
};
use super::{validate_inputs, SignalBuilder, SignalEngine};
use crate::error::Result;
use crate::features::{detect_breakout, multi_horizon_momentum, realized_vol_pct, vol_expansion_ratio, Breakout};
use crate::models::{
    EngineMetadata, EngineTier, FundamentalSet, IndicatorSet, MacroRegime, MarketContext,
    MarketData, Signal, SignalResult, SwingRegime,
};
use crate::regime::SwingRegimeDetector;

/// Swing-horizon scoring engine
///
/// Four-stage pipeline over a 1-2 week holding period: swing regime
/// classification, weighted momentum/volatility/oscillator/price-action
/// blend, regime-capped sizing, and the shared reality check.
#[derive(Debug)]
pub struct SwingEngine {
    config: SwingEngineConfig,
    detector: SwingRegimeDetector,
}

#[derive(Debug)]
pub struct SwingEngineConfig {
    pub momentum_weight: f64,
    pub vol_expansion_weight: f64,
    pub oscillator_weight: f64,
    pub price_action_weight: f64,
    pub confidence_min: f64,
    pub dead_zone: f64,
    pub base_size_pct: f64,
}

impl Default for SwingEngineConfig {
    fn default() -> Self {
        Self {
            momentum_weight: 0.35,
            vol_expansion_weight: 0.15,
            oscillator_weight: 0.25,
            price_action_weight: 0.25,
            confidence_min: 0.6,
            dead_zone: 0.1,
            base_size_pct: 10.0,
        }
    }
}

impl Default for SwingEngine {
    fn default() -> Self {
        Self {
            config: SwingEngineConfig::default(),
            detector: SwingRegimeDetector::default(),
        }
    }
}

impl SwingEngine {
    pub fn new(config: SwingEngineConfig) -> Self {
        Self {
            config,
            detector: SwingRegimeDetector::default(),
        }
    }

    /// Regime multiplier and exposure ceiling for stage C
    fn regime_sizing(regime: SwingRegime, base: f64) -> Sizing {
        let (multiplier, ceiling) = match regime {
            SwingRegime::TrendingUp => (1.2, 20.0),
            SwingRegime::BreakoutUp => (1.3, 20.0),
            SwingRegime::TrendingDown => (1.0, 15.0),
            SwingRegime::BreakoutDown => (1.1, 15.0),
            SwingRegime::RangeBound => (0.8, 10.0),
            SwingRegime::VolatileChop => (0.4, 5.0),
        };
        Sizing {
            base_size_pct: base,
            regime_multiplier: multiplier,
            regime_ceiling_pct: ceiling,
        }
    }

    fn regime_narrative(regime: SwingRegime) -> &'static str {
        match regime {
            SwingRegime::TrendingUp => "moving averages stacked bullishly, riding the trend",
            SwingRegime::TrendingDown => "moving averages stacked bearishly",
            SwingRegime::RangeBound => "oscillating range with support and resistance intact",
            SwingRegime::VolatileChop => "high volatility without direction, trading small",
            SwingRegime::BreakoutUp => "fresh close above the prior range",
            SwingRegime::BreakoutDown => "fresh close below the prior range",
        }
    }

    /// Oscillator/trend agreement from the external indicator map
    fn oscillator_factor(indicators: &IndicatorSet) -> (Option<f64>, String) {
        let rsi = indicators.get("rsi");
        let macd = indicators.get("macd");
        let macd_signal = indicators.get("macd_signal");

        let mut parts = Vec::new();
        if let Some(rsi) = rsi {
            parts.push(((rsi - 50.0) / 50.0).clamp(-1.0, 1.0));
        }
        if let Some(macd) = macd {
            let above_signal = macd_signal.map(|s| macd > s).unwrap_or(macd > 0.0);
            parts.push(match (macd > 0.0, above_signal) {
                (true, true) => 0.8,
                (true, false) | (false, true) => 0.2,
                (false, false) => -0.8,
            });
        }

        if parts.is_empty() {
            return (None, "rsi/macd not supplied".to_string());
        }
        let score = parts.iter().sum::<f64>() / parts.len() as f64;
        (
            Some(score),
            format!(
                "rsi {} / macd {}",
                rsi.map(|v| format!("{:.0}", v)).unwrap_or_else(|| "n/a".into()),
                macd.map(|v| format!("{:+.2}", v)).unwrap_or_else(|| "n/a".into()),
            ),
        )
    }

    /// Breakout/pullback price action
    fn price_action_factor(data: &MarketData, momentum: f64) -> (Option<f64>, String) {
        match detect_breakout(&data.candles, 20, 0.01) {
            Breakout::Up => (Some(0.8), "breakout above 20-bar range".to_string()),
            Breakout::Down => (Some(-0.8), "breakdown below 20-bar range".to_string()),
            Breakout::None => {
                // Pullback logic: shallow dip against a standing trend
                let closes: Vec<f64> = data.candles.iter().map(|c| c.close).collect();
                let short_term = multi_horizon_momentum(&closes, &[(3, 1.0)]).unwrap_or(0.0);
                if momentum > 0.15 && short_term < 0.0 {
                    (Some(0.4), "pullback within an uptrend".to_string())
                } else if momentum < -0.15 && short_term > 0.0 {
                    (Some(-0.4), "weak bounce within a downtrend".to_string())
                } else {
                    (Some(0.0), "no actionable price pattern".to_string())
                }
            }
        }
    }
}

impl SignalEngine for SwingEngine {
    fn generate_signal(
        &self,
        symbol: &str,
        market_data: &MarketData,
        indicators: &IndicatorSet,
        _fundamentals: &FundamentalSet,
        context: &MarketContext,
    ) -> Result<SignalResult> {
        validate_inputs("swing", symbol, market_data, self.min_bars())?;

        if context.regime == MacroRegime::NoTrade {
            return Ok(no_trade_result(self.metadata(), symbol, context));
        }

        // Stage A: regime, recomputed fresh from the tail every call
        let regime = self.detector.classify(&market_data.candles).ok_or_else(|| {
            crate::error::EngineError::insufficient_data(
                "swing",
                symbol,
                "series too short for regime classification",
            )
        })?;

        let closes: Vec<f64> = market_data.candles.iter().map(|c| c.close).collect();
        let current_price = *closes.last().unwrap_or(&0.0);
        let momentum =
            multi_horizon_momentum(&closes, &[(5, 0.3), (10, 0.3), (20, 0.4)]);
        let momentum_value = momentum.unwrap_or(0.0);

        let vol = realized_vol_pct(&market_data.candles, 14).unwrap_or(0.0);
        let vol_ratio = vol_expansion_ratio(&market_data.candles, 14, 20);
        // Expansion only supports the move when there is a move to support
        let vol_factor = vol_ratio.map(|r| ((r - 1.0) * 2.0).clamp(-1.0, 1.0) * momentum_value.signum());

        let (oscillator, oscillator_note) = Self::oscillator_factor(indicators);
        let (price_action, price_action_note) =
            Self::price_action_factor(market_data, momentum_value);

        // Stage B: fixed-weight blend
        let blended = blend_factors(&[
            WeightedFactor {
                name: "momentum",
                weight: self.config.momentum_weight,
                score: momentum,
                note: format!("multi-horizon momentum {:+.2}", momentum_value),
            },
            WeightedFactor {
                name: "vol_expansion",
                weight: self.config.vol_expansion_weight,
                score: vol_factor,
                note: format!(
                    "range expansion ratio {:.2}",
                    vol_ratio.unwrap_or(1.0)
                ),
            },
            WeightedFactor {
                name: "oscillator",
                weight: self.config.oscillator_weight,
                score: oscillator,
                note: oscillator_note,
            },
            WeightedFactor {
                name: "price_action",
                weight: self.config.price_action_weight,
                score: price_action,
                note: price_action_note,
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
                dead_zone: self.config.dead_zone,
            },
        );

        let (confidence, confluence_note) =
            confluence_bonus(confidence, blended.score, blended.agreeing, blended.active);

        // Stage C: allocation
        let sizing = Self::regime_sizing(regime, self.config.base_size_pct);
        let sized = position_size(signal, confidence, &sizing);

        // Stage D: reality check, independent of A/B
        let reality = RealityInputs {
            vix: context.vix,
            iv_percentile: indicators.get("iv_percentile"),
            bb_width: indicators.get("bb_width"),
            realized_vol_pct: vol,
            momentum: momentum_value,
        };
        let (final_size, reality_notes) = reality_adjustment(sized, &reality);

        let atr = indicators
            .get("atr")
            .unwrap_or(vol * current_price);

        let mut builder = SignalBuilder::new(self.metadata(), symbol)
            .signal(signal)
            .confidence(confidence)
            .position_size_pct(final_size)
            .reason(format!(
                "Regime {}: {}",
                regime.as_str(),
                Self::regime_narrative(regime)
            ))
            .reasons(blended.reasons)
            .metadata_entry("regime", regime.as_str())
            .metadata_entry("score", format!("{:.3}", blended.score));

        if let Some(note) = penalty_note {
            builder = builder.reason(note);
        }
        if let Some(note) = confluence_note {
            builder = builder.reason(note);
        }
        builder = builder.reason(format!(
            "Sizing: base {:.1}% x confidence x regime -> {:.2}%",
            self.config.base_size_pct, final_size
        ));
        builder = builder.reasons(reality_notes);

        match signal {
            Signal::Buy => {
                builder = builder
                    .entry_range(current_price * 0.99, current_price * 1.01)
                    .stop_loss(current_price - 2.0 * atr)
                    .take_profits(
                        vec![
                            current_price * 1.05,
                            current_price * 1.10,
                            current_price * 1.20,
                        ],
                        current_price,
                    );
            }
            Signal::Sell => {
                builder = builder
                    .entry_range(current_price * 0.99, current_price * 1.01)
                    .stop_loss(current_price + 2.0 * atr)
                    .take_profits(
                        vec![current_price * 0.95, current_price * 0.90],
                        current_price,
                    );
            }
            Signal::Hold => {}
        }

        Ok(builder.build())
    }

    fn metadata(&self) -> EngineMetadata {
        EngineMetadata {
            name: "swing".to_string(),
            tier: EngineTier::Pro,
            timeframe: "1-2 weeks".to_string(),
            version: "1.2.0".to_string(),
            features: vec![
                "regime-aware".to_string(),
                "four-stage-pipeline".to_string(),
                "reality-adjusted-sizing".to_string(),
            ],
        }
    }

    fn required_indicators(&self) -> Vec<String> {
        vec!["rsi".to_string(), "macd".to_string(), "atr".to_string()]
    }

    fn min_bars(&self) -> usize {
        50
    }
}
