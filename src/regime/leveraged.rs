/// Leverage-decay state machine for daily-rebalanced leveraged instruments.
///
/// Priority-ordered selection:
/// 1. volatility-index breach          → VolatilitySpike (terminal, zero size)
/// 2. range-bound AND high realized vol → LeverageDecay  (terminal hard veto)
/// 3. range-bound alone                → RangeQuiet
/// 4. correlation-gated directional agreement with the underlying
///    → TrendLowVol (full size) / TrendRisingVol (half size) / TrendDown
/// 5. fallback                         → Defensive
use crate::features::{
    multi_horizon_momentum, pearson_correlation, range_stats, realized_vol_pct,
    vol_expansion_ratio,
};
use crate::models::{Candle, LeveragedRegime, MarketData};

#[derive(Debug)]
pub struct LeveragedRegimeConfig {
    /// Volatility index close at or above this is a spike (terminal)
    pub vix_spike_level: f64,
    /// Volatility index above this marks rising-vol trend conditions
    pub vix_elevated_level: f64,
    pub range_window: usize,
    /// Close-to-close range width below this counts as range-bound
    pub range_width_max: f64,
    pub vol_period: usize,
    /// Realized vol above this is "high" for a 3x product
    pub high_vol_threshold: f64,
    /// Smoothed-range expansion ratio above this marks rising volatility
    pub vol_rising_ratio: f64,
    /// Minimum correlation with the underlying before trend states apply
    pub min_correlation: f64,
    /// |momentum| above this counts as directional
    pub trend_momentum_threshold: f64,
}

impl Default for LeveragedRegimeConfig {
    fn default() -> Self {
        Self {
            vix_spike_level: 32.0,
            vix_elevated_level: 24.0,
            range_window: 10,
            range_width_max: 0.015,
            vol_period: 10,
            high_vol_threshold: 0.03,
            vol_rising_ratio: 1.25,
            min_correlation: 0.6,
            trend_momentum_threshold: 0.1,
        }
    }
}

#[derive(Debug)]
pub struct LeveragedRegimeDetector {
    config: LeveragedRegimeConfig,
}

impl Default for LeveragedRegimeDetector {
    fn default() -> Self {
        Self::new(LeveragedRegimeConfig::default())
    }
}

impl LeveragedRegimeDetector {
    pub fn new(config: LeveragedRegimeConfig) -> Self {
        Self { config }
    }

    pub fn min_bars(&self) -> usize {
        (self.config.vol_period + 1).max(self.config.range_window)
    }

    /// Classify from the candle tail plus reference series.
    ///
    /// Missing reference series never fail the call: without a volatility
    /// index the spike check falls back to the context VIX handed in by the
    /// caller; without an underlying series the trend states are unreachable
    /// and the machine lands in Defensive.
    pub fn classify(&self, data: &MarketData, context_vix: f64) -> Option<LeveragedRegime> {
        let candles = &data.candles;
        if candles.len() < self.min_bars() {
            return None;
        }

        // 1. Volatility-index breach is terminal
        let vix = data
            .volatility_index
            .as_ref()
            .and_then(|series| series.last())
            .map(|c| c.close)
            .unwrap_or(context_vix);
        if vix >= self.config.vix_spike_level {
            return Some(LeveragedRegime::VolatilitySpike);
        }

        let stats = range_stats(candles, self.config.range_window);
        let range_bound = stats
            .map(|s| s.width_pct < self.config.range_width_max)
            .unwrap_or(false);

        let vol = realized_vol_pct(candles, self.config.vol_period).unwrap_or(0.0);
        let high_vol = vol > self.config.high_vol_threshold;

        // 2. Chop is a hard veto for a daily-rebalanced product: flat closes
        //    with violent intraday swings bleed value every rebalance
        if range_bound && high_vol {
            return Some(LeveragedRegime::LeverageDecay);
        }

        // 3. Quiet range: no decay pressure, but nothing to ride either
        if range_bound {
            return Some(LeveragedRegime::RangeQuiet);
        }

        // 4. Trend states require the instrument to actually track its index
        if let Some(underlying) = data.underlying.as_ref() {
            let correlation = pearson_correlation(candles, underlying);
            if correlation >= self.config.min_correlation {
                let own_closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
                let idx_closes: Vec<f64> = underlying.iter().map(|c| c.close).collect();

                let own_momentum =
                    multi_horizon_momentum(&own_closes, &[(5, 0.4), (20, 0.6)]).unwrap_or(0.0);
                let idx_momentum =
                    multi_horizon_momentum(&idx_closes, &[(5, 0.4), (20, 0.6)]).unwrap_or(0.0);

                let threshold = self.config.trend_momentum_threshold;
                if own_momentum > threshold && idx_momentum > 0.0 {
                    let vol_rising = vol_expansion_ratio(
                        candles,
                        self.config.vol_period,
                        self.config.range_window,
                    )
                    .map(|r| r > self.config.vol_rising_ratio)
                    .unwrap_or(false);

                    return if high_vol || vol_rising || vix > self.config.vix_elevated_level {
                        Some(LeveragedRegime::TrendRisingVol)
                    } else {
                        Some(LeveragedRegime::TrendLowVol)
                    };
                }
                if own_momentum < -threshold && idx_momentum < 0.0 {
                    return Some(LeveragedRegime::TrendDown);
                }
            }
        }

        // 5. Nothing qualified: most conservative state
        Some(LeveragedRegime::Defensive)
    }
}
