use super::scoring::{
    blend_factors, confidence_from_score, confluence_bonus, decide, missing_required_penalty,
    no_trade_result, position_size, reality_adjustment, RealityInputs, Sizing, Thresholds,
    WeightedFactor,
};
use super::{validate_inputs, SignalBuilder, SignalEngine};
use crate::error::Result;
use crate::features::{multi_horizon_momentum, pearson_correlation, realized_vol_pct};
use crate::models::{
    EngineMetadata, EngineTier, FundamentalSet, IndicatorSet, LeveragedRegime, MacroRegime,
    MarketContext, MarketData, Signal, SignalResult,
};
use crate::regime::LeveragedRegimeDetector;

/// Engine for daily-rebalanced 3x-leveraged instruments.
///
/// Stage A is the leverage-decay state machine: decay and volatility-spike
/// states are terminal and zero any position before stages B-D run, because
/// chop erodes a daily-rebalanced product regardless of how good the
/// directional score looks.
#[derive(Debug)]
pub struct LeveragedEngine {
    detector: LeveragedRegimeDetector,
}

const CONFIDENCE_MIN: f64 = 0.6;
const DEAD_ZONE: f64 = 0.1;
const BASE_SIZE_PCT: f64 = 6.0;

impl Default for LeveragedEngine {
    fn default() -> Self {
        Self {
            detector: LeveragedRegimeDetector::default(),
        }
    }
}

impl LeveragedEngine {
    /// Regime multiplier and ceiling; trend-with-rising-vol runs at half size
    fn regime_sizing(regime: LeveragedRegime) -> Sizing {
        let (multiplier, ceiling) = match regime {
            LeveragedRegime::TrendLowVol => (1.0, 10.0),
            LeveragedRegime::TrendRisingVol => (0.5, 5.0),
            LeveragedRegime::TrendDown => (0.8, 8.0),
            LeveragedRegime::RangeQuiet => (0.4, 3.0),
            LeveragedRegime::Defensive => (0.25, 2.0),
            // Terminal states never reach sizing
            LeveragedRegime::LeverageDecay | LeveragedRegime::VolatilitySpike => (0.0, 0.0),
        };
        Sizing {
            base_size_pct: BASE_SIZE_PCT,
            regime_multiplier: multiplier,
            regime_ceiling_pct: ceiling,
        }
    }

    fn terminal_narrative(regime: LeveragedRegime) -> &'static str {
        match regime {
            LeveragedRegime::LeverageDecay => {
                "range-bound closes with high realized volatility: daily rebalancing bleeds value, flat is the trade"
            }
            LeveragedRegime::VolatilitySpike => {
                "volatility index breached the spike level: leveraged exposure stands down"
            }
            _ => "",
        }
    }
}

impl SignalEngine for LeveragedEngine {
    fn generate_signal(
        &self,
        symbol: &str,
        market_data: &MarketData,
        indicators: &IndicatorSet,
        _fundamentals: &FundamentalSet,
        context: &MarketContext,
    ) -> Result<SignalResult> {
        validate_inputs("leveraged", symbol, market_data, self.min_bars())?;

        if context.regime == MacroRegime::NoTrade {
            return Ok(no_trade_result(self.metadata(), symbol, context));
        }

        let regime = self
            .detector
            .classify(market_data, context.vix)
            .ok_or_else(|| {
                crate::error::EngineError::insufficient_data(
                    "leveraged",
                    symbol,
                    "series too short for state classification",
                )
            })?;

        // Terminal states are a hard veto, not a penalty: zero size, no B-D
        if regime.is_terminal() {
            return Ok(SignalBuilder::new(self.metadata(), symbol)
                .signal(Signal::Hold)
                .confidence(0.7)
                .reason(format!(
                    "Regime {}: {}",
                    regime.as_str(),
                    Self::terminal_narrative(regime)
                ))
                .metadata_entry("regime", regime.as_str())
                .build());
        }

        let closes: Vec<f64> = market_data.candles.iter().map(|c| c.close).collect();
        let current_price = *closes.last().unwrap_or(&0.0);

        let momentum = multi_horizon_momentum(&closes, &[(5, 0.4), (10, 0.3), (20, 0.3)]);
        let momentum_value = momentum.unwrap_or(0.0);

        // Underlying confirmation: the index's own trend, scaled by how well
        // this product has been tracking it
        let underlying_factor = market_data.underlying.as_ref().and_then(|underlying| {
            let idx_closes: Vec<f64> = underlying.iter().map(|c| c.close).collect();
            let idx_momentum = multi_horizon_momentum(&idx_closes, &[(5, 0.4), (20, 0.6)])?;
            let correlation = pearson_correlation(&market_data.candles, underlying);
            Some((idx_momentum * correlation.max(0.0)).clamp(-1.0, 1.0))
        });

        let vix_level = market_data
            .volatility_index
            .as_ref()
            .and_then(|s| s.last())
            .map(|c| c.close)
            .unwrap_or(context.vix);
        // Calm vol index is a tailwind for levered longs, rich vol a drag
        let vix_factor = ((20.0 - vix_level) / 15.0).clamp(-1.0, 1.0);

        let oscillator = indicators
            .get("rsi")
            .map(|rsi| ((rsi - 50.0) / 50.0).clamp(-1.0, 1.0));

        let blended = blend_factors(&[
            WeightedFactor {
                name: "momentum",
                weight: 0.35,
                score: momentum,
                note: format!("5/10/20-bar blend {:+.2}", momentum_value),
            },
            WeightedFactor {
                name: "underlying",
                weight: 0.3,
                score: underlying_factor,
                note: "index trend x tracking correlation".to_string(),
            },
            WeightedFactor {
                name: "vol_index",
                weight: 0.15,
                score: Some(vix_factor),
                note: format!("volatility index {:.1}", vix_level),
            },
            WeightedFactor {
                name: "oscillator",
                weight: 0.2,
                score: oscillator,
                note: format!(
                    "rsi {}",
                    indicators
                        .get("rsi")
                        .map(|v| format!("{:.0}", v))
                        .unwrap_or_else(|| "n/a".into())
                ),
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

        let vol = realized_vol_pct(&market_data.candles, 10).unwrap_or(0.0);
        let reality = RealityInputs {
            vix: vix_level,
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
                "Regime {}: leverage state machine on {} bars",
                regime.as_str(),
                market_data.candles.len().min(60)
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
                // Tight risk on a 3x product
                builder = builder
                    .entry_range(current_price * 0.995, current_price * 1.005)
                    .stop_loss(current_price - 1.0 * atr)
                    .take_profits(
                        vec![current_price * 1.04, current_price * 1.08],
                        current_price,
                    );
            }
            Signal::Sell => {
                builder = builder
                    .entry_range(current_price * 0.995, current_price * 1.005)
                    .stop_loss(current_price + 1.0 * atr)
                    .take_profits(
                        vec![current_price * 0.96, current_price * 0.92],
                        current_price,
                    );
            }
            Signal::Hold => {}
        }

        Ok(builder.build())
    }

    fn metadata(&self) -> EngineMetadata {
        EngineMetadata {
            name: "leveraged".to_string(),
            tier: EngineTier::Elite,
            timeframe: "1-2 weeks".to_string(),
            version: "1.1.0".to_string(),
            features: vec![
                "leverage-decay-state-machine".to_string(),
                "underlying-correlation-gate".to_string(),
                "four-stage-pipeline".to_string(),
            ],
        }
    }

    fn required_indicators(&self) -> Vec<String> {
        vec!["rsi".to_string(), "atr".to_string()]
    }

    fn min_bars(&self) -> usize {
        60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(symbol: &str, day: i64, high: f64, low: f64, close: f64) -> crate::models::Candle {
        crate::models::Candle {
            symbol: symbol.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 5, 21, 0, 0).unwrap()
                + chrono::Duration::days(day),
            open: close,
            high,
            low,
            close,
            volume: 20_000_000.0,
        }
    }

    fn flat_vix(level: f64, days: i64) -> Vec<crate::models::Candle> {
        (0..days).map(|d| candle("VIX", d, level, level, level)).collect()
    }

    fn trending_data(daily_gain: f64, days: i64, vix: f64) -> MarketData {
        let mut instrument = Vec::new();
        let mut underlying = Vec::new();
        let mut idx = 100.0;
        let mut lev = 50.0;
        for d in 0..days {
            let daily_return = daily_gain + 0.002 * (d as f64 * 1.3).sin();
            idx *= 1.0 + daily_return;
            lev *= 1.0 + daily_return * 3.0;
            underlying.push(candle("QQQ", d, idx * 1.003, idx * 0.997, idx));
            instrument.push(candle("TQQQ", d, lev * 1.008, lev * 0.992, lev));
        }
        MarketData::new(instrument).with_reference_series(underlying, flat_vix(vix, days))
    }

    fn indicators(rsi: f64) -> IndicatorSet {
        let mut set = IndicatorSet::default();
        set.insert("rsi", rsi);
        set.insert("atr", 1.2);
        set
    }

    #[test]
    fn test_decay_state_vetoes_regardless_of_score() {
        // 1% close-to-close range over the window, violent intraday swings.
        // Bullish oscillator inputs must not matter: chop is a hard veto.
        let candles: Vec<crate::models::Candle> = (0..70)
            .map(|d| {
                let close = 100.0 + if d % 2 == 0 { 0.0 } else { 1.0 };
                candle("TQQQ", d, 104.5, 95.5, close)
            })
            .collect();
        let data = MarketData::new(candles).with_reference_series(
            (0..70).map(|d| candle("QQQ", d, 101.0, 99.0, 100.0)).collect(),
            flat_vix(22.0, 70),
        );
        let context = MarketContext::neutral(Utc::now());

        let result = LeveragedEngine::default()
            .generate_signal("TQQQ", &data, &indicators(65.0), &FundamentalSet::default(), &context)
            .unwrap();

        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.position_size_pct, 0.0);
        assert!(result.reasoning[0].contains("LEVERAGE_DECAY"));
    }

    #[test]
    fn test_volatility_spike_stands_down() {
        let data = trending_data(0.005, 70, 36.0);
        let context = MarketContext::neutral(Utc::now());

        let result = LeveragedEngine::default()
            .generate_signal("TQQQ", &data, &indicators(60.0), &FundamentalSet::default(), &context)
            .unwrap();

        assert_eq!(result.signal, Signal::Hold);
        assert_eq!(result.position_size_pct, 0.0);
        assert!(result.reasoning[0].contains("VOLATILITY_SPIKE"));
    }

    #[test]
    fn test_low_vol_trend_runs_full_size() {
        let data = trending_data(0.005, 70, 14.0);
        let context = MarketContext::neutral(Utc::now());

        let result = LeveragedEngine::default()
            .generate_signal("TQQQ", &data, &indicators(62.0), &FundamentalSet::default(), &context)
            .unwrap();

        assert_eq!(result.signal, Signal::Buy);
        assert!(result.position_size_pct > 0.0);
        assert!(result.position_size_pct <= 10.0);
        assert!(result.reasoning[0].contains("TREND_LOW_VOL"));
    }

    #[test]
    fn test_rising_vol_trend_halves_ceiling() {
        let low_vol = trending_data(0.005, 70, 14.0);
        let rising = trending_data(0.005, 70, 27.0);
        let context = MarketContext::neutral(Utc::now());
        let engine = LeveragedEngine::default();

        let full = engine
            .generate_signal("TQQQ", &low_vol, &indicators(62.0), &FundamentalSet::default(), &context)
            .unwrap();
        let half = engine
            .generate_signal("TQQQ", &rising, &indicators(62.0), &FundamentalSet::default(), &context)
            .unwrap();

        assert!(half.position_size_pct <= 5.0);
        assert!(half.position_size_pct < full.position_size_pct);
    }

    #[test]
    fn test_missing_reference_series_is_defensive_not_error() {
        let data = MarketData::new(trending_data(0.005, 70, 14.0).candles);
        let context = MarketContext::neutral(Utc::now());

        let result = LeveragedEngine::default()
            .generate_signal("TQQQ", &data, &indicators(62.0), &FundamentalSet::default(), &context)
            .unwrap();

        assert!(result.reasoning[0].contains("DEFENSIVE"));
        assert!(result.position_size_pct.abs() <= 2.0);
    }

    #[test]
    fn test_needs_sixty_bars() {
        let data = trending_data(0.005, 30, 14.0);
        let context = MarketContext::neutral(Utc::now());

        let err = LeveragedEngine::default()
            .generate_signal("TQQQ", &data, &indicators(60.0), &FundamentalSet::default(), &context)
            .unwrap_err();
        assert!(err.to_string().contains("need 60"));
    }
}
