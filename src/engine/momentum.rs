use super::scoring::{
    blend_factors, confidence_from_score, confluence_bonus, decide, missing_required_penalty,
    no_trade_result, position_size, reality_adjustment, RealityInputs, Sizing, Thresholds,
    WeightedFactor,
};
use super::{validate_inputs, SignalBuilder, SignalEngine};
use crate::error::Result;
use crate::features::{multi_horizon_momentum, realized_vol_pct, vol_expansion_ratio};
use crate::models::{
    EngineMetadata, EngineTier, FundamentalSet, IndicatorSet, MacroRegime, MarketContext,
    MarketData, Signal, SignalResult, SwingRegime,
};
use crate::regime::{SwingRegimeConfig, SwingRegimeDetector};

/// Short-horizon momentum engine
///
/// Same four-stage pipeline as the swing engine on a tighter 20-bar lookback,
/// with momentum carrying half the stage-B weight. Aimed at 3-5 day holds.
#[derive(Debug)]
pub struct MomentumEngine {
    detector: SwingRegimeDetector,
}

const MOMENTUM_WEIGHT: f64 = 0.5;
const VOL_EXPANSION_WEIGHT: f64 = 0.1;
const OSCILLATOR_WEIGHT: f64 = 0.2;
const PRICE_ACTION_WEIGHT: f64 = 0.2;
const CONFIDENCE_MIN: f64 = 0.55;
const DEAD_ZONE: f64 = 0.08;
const BASE_SIZE_PCT: f64 = 8.0;

impl Default for MomentumEngine {
    fn default() -> Self {
        // Tighter windows than the swing detector: this engine reacts in days
        Self {
            detector: SwingRegimeDetector::new(SwingRegimeConfig {
                short_ma_period: 5,
                long_ma_period: 10,
                vol_period: 9,
                range_window: 10,
                breakout_window: 10,
                breakout_margin_pct: 0.008,
                range_width_max: 0.04,
                high_vol_threshold: 0.035,
                flat_momentum_threshold: 0.12,
            }),
        }
    }
}

impl MomentumEngine {
    fn regime_sizing(regime: SwingRegime) -> Sizing {
        let (multiplier, ceiling) = match regime {
            SwingRegime::TrendingUp | SwingRegime::BreakoutUp => (1.2, 15.0),
            SwingRegime::TrendingDown | SwingRegime::BreakoutDown => (1.0, 12.0),
            SwingRegime::RangeBound => (0.6, 6.0),
            SwingRegime::VolatileChop => (0.3, 4.0),
        };
        Sizing {
            base_size_pct: BASE_SIZE_PCT,
            regime_multiplier: multiplier,
            regime_ceiling_pct: ceiling,
        }
    }
}

impl SignalEngine for MomentumEngine {
    fn generate_signal(
        &self,
        symbol: &str,
        market_data: &MarketData,
        indicators: &IndicatorSet,
        _fundamentals: &FundamentalSet,
        context: &MarketContext,
    ) -> Result<SignalResult> {
        validate_inputs("momentum", symbol, market_data, self.min_bars())?;

        if context.regime == MacroRegime::NoTrade {
            return Ok(no_trade_result(self.metadata(), symbol, context));
        }

        let regime = self.detector.classify(&market_data.candles).ok_or_else(|| {
            crate::error::EngineError::insufficient_data(
                "momentum",
                symbol,
                "series too short for regime classification",
            )
        })?;

        let closes: Vec<f64> = market_data.candles.iter().map(|c| c.close).collect();
        let current_price = *closes.last().unwrap_or(&0.0);

        let momentum = multi_horizon_momentum(&closes, &[(3, 0.4), (5, 0.3), (10, 0.3)]);
        let momentum_value = momentum.unwrap_or(0.0);

        let vol = realized_vol_pct(&market_data.candles, 9).unwrap_or(0.0);
        let vol_ratio = vol_expansion_ratio(&market_data.candles, 9, 10);
        let vol_factor =
            vol_ratio.map(|r| ((r - 1.0) * 2.0).clamp(-1.0, 1.0) * momentum_value.signum());

        // RSI velocity matters more than level on this horizon
        let oscillator = match (indicators.get("rsi"), indicators.get("rsi_prev")) {
            (Some(rsi), Some(prev)) => Some((((rsi - prev) / 10.0) + (rsi - 50.0) / 100.0).clamp(-1.0, 1.0)),
            (Some(rsi), None) => Some(((rsi - 50.0) / 50.0).clamp(-1.0, 1.0)),
            _ => None,
        };

        // Short-horizon thrust: last 3 bars vs the 10-bar baseline
        let thrust = multi_horizon_momentum(&closes, &[(3, 1.0)])
            .map(|short| (short * 1.5).clamp(-1.0, 1.0));

        let blended = blend_factors(&[
            WeightedFactor {
                name: "momentum",
                weight: MOMENTUM_WEIGHT,
                score: momentum,
                note: format!("3/5/10-bar blend {:+.2}", momentum_value),
            },
            WeightedFactor {
                name: "vol_expansion",
                weight: VOL_EXPANSION_WEIGHT,
                score: vol_factor,
                note: format!("expansion ratio {:.2}", vol_ratio.unwrap_or(1.0)),
            },
            WeightedFactor {
                name: "oscillator",
                weight: OSCILLATOR_WEIGHT,
                score: oscillator,
                note: format!(
                    "rsi {}",
                    indicators
                        .get("rsi")
                        .map(|v| format!("{:.0}", v))
                        .unwrap_or_else(|| "n/a".into())
                ),
            },
            WeightedFactor {
                name: "thrust",
                weight: PRICE_ACTION_WEIGHT,
                score: thrust,
                note: "3-bar thrust vs baseline".to_string(),
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
                confidence_min: CONFIDENCE_MIN,
                dead_zone: DEAD_ZONE,
            },
        );
        let (confidence, confluence_note) =
            confluence_bonus(confidence, blended.score, blended.agreeing, blended.active);

        let sized = position_size(signal, confidence, &Self::regime_sizing(regime));

        let reality = RealityInputs {
            vix: context.vix,
            iv_percentile: indicators.get("iv_percentile"),
            bb_width: indicators.get("bb_width"),
            realized_vol_pct: vol,
            momentum: momentum_value,
        };
        let (final_size, reality_notes) = reality_adjustment(sized, &reality);

        let atr = indicators.get("atr").unwrap_or(vol * current_price);

        let mut builder = SignalBuilder::new(self.metadata(), symbol)
            .signal(signal)
            .confidence(confidence)
            .position_size_pct(final_size)
            .reason(format!(
                "Regime {}: short-horizon read of the last {} bars",
                regime.as_str(),
                self.min_bars()
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
            BASE_SIZE_PCT, final_size
        ));
        builder = builder.reasons(reality_notes);

        match signal {
            Signal::Buy => {
                builder = builder
                    .entry_range(current_price * 0.995, current_price * 1.005)
                    .stop_loss(current_price - 1.5 * atr)
                    .take_profits(
                        vec![current_price * 1.03, current_price * 1.06],
                        current_price,
                    );
            }
            Signal::Sell => {
                builder = builder
                    .entry_range(current_price * 0.995, current_price * 1.005)
                    .stop_loss(current_price + 1.5 * atr)
                    .take_profits(
                        vec![current_price * 0.97, current_price * 0.94],
                        current_price,
                    );
            }
            Signal::Hold => {}
        }

        Ok(builder.build())
    }

    fn metadata(&self) -> EngineMetadata {
        EngineMetadata {
            name: "momentum".to_string(),
            tier: EngineTier::Basic,
            timeframe: "3-5 days".to_string(),
            version: "1.0.1".to_string(),
            features: vec![
                "regime-aware".to_string(),
                "four-stage-pipeline".to_string(),
            ],
        }
    }

    fn required_indicators(&self) -> Vec<String> {
        vec!["rsi".to_string(), "atr".to_string()]
    }

    fn min_bars(&self) -> usize {
        20
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candles_from_closes(closes: &[f64]) -> MarketData {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| crate::models::Candle {
                symbol: "NVDA".to_string(),
                timestamp: Utc::now() + chrono::Duration::days(i as i64),
                open: close,
                high: close * 1.004,
                low: close * 0.996,
                close,
                volume: 5_000_000.0,
            })
            .collect();
        MarketData::new(candles)
    }

    fn indicators(rsi: f64) -> IndicatorSet {
        let mut set = IndicatorSet::default();
        set.insert("rsi", rsi);
        set.insert("atr", 1.5);
        set
    }

    #[test]
    fn test_sharp_rally_generates_buy() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 * 1.007f64.powi(i)).collect();
        let data = candles_from_closes(&closes);
        let context = MarketContext::neutral(Utc::now());

        let result = MomentumEngine::default()
            .generate_signal("NVDA", &data, &indicators(64.0), &FundamentalSet::default(), &context)
            .unwrap();

        assert_eq!(result.signal, Signal::Buy);
        assert!(result.position_size_pct > 0.0);
        assert!(result.position_size_pct <= 15.0);
    }

    #[test]
    fn test_sharp_selloff_generates_sell() {
        let closes: Vec<f64> = (0..25).map(|i| 150.0 * 0.992f64.powi(i)).collect();
        let data = candles_from_closes(&closes);
        let context = MarketContext::neutral(Utc::now());

        let result = MomentumEngine::default()
            .generate_signal("NVDA", &data, &indicators(34.0), &FundamentalSet::default(), &context)
            .unwrap();

        assert_eq!(result.signal, Signal::Sell);
        assert!(result.position_size_pct < 0.0);
    }

    #[test]
    fn test_minimum_lookback_is_twenty_bars() {
        let engine = MomentumEngine::default();
        assert_eq!(engine.min_bars(), 20);

        let closes: Vec<f64> = (0..19).map(|i| 100.0 + i as f64).collect();
        let data = candles_from_closes(&closes);
        let context = MarketContext::neutral(Utc::now());

        let err = engine
            .generate_signal("NVDA", &data, &indicators(50.0), &FundamentalSet::default(), &context)
            .unwrap_err();
        assert!(err.to_string().contains("need 20"));
    }

    #[test]
    fn test_idempotent_given_same_inputs() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 * 1.007f64.powi(i)).collect();
        let data = candles_from_closes(&closes);
        let context = MarketContext::neutral(Utc::now());
        let engine = MomentumEngine::default();

        let first = engine
            .generate_signal("NVDA", &data, &indicators(64.0), &FundamentalSet::default(), &context)
            .unwrap();
        let second = engine
            .generate_signal("NVDA", &data, &indicators(64.0), &FundamentalSet::default(), &context)
            .unwrap();

        assert_eq!(first.signal, second.signal);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.reasoning, second.reasoning);
    }
}
