/// Swing regime classifier: moving-average trend + realized-volatility proxy
/// + range-vs-breakout test over a recent window.
///
/// Recomputed fresh from the candle tail on every call; never cached.
use crate::features::{
    calculate_sma, detect_breakout, multi_horizon_momentum, range_stats, realized_vol_pct,
    Breakout,
};
use crate::models::{Candle, SwingRegime};

#[derive(Debug)]
pub struct SwingRegimeConfig {
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    pub vol_period: usize,
    pub range_window: usize,
    pub breakout_window: usize,
    pub breakout_margin_pct: f64,
    /// Range width below this (fraction of mid) counts as range-bound
    pub range_width_max: f64,
    /// Realized vol above this (fraction of price per bar) counts as high
    pub high_vol_threshold: f64,
    /// |momentum| below this counts as directionless
    pub flat_momentum_threshold: f64,
}

impl Default for SwingRegimeConfig {
    fn default() -> Self {
        Self {
            short_ma_period: 10,
            long_ma_period: 20,
            vol_period: 14,
            range_window: 20,
            breakout_window: 20,
            breakout_margin_pct: 0.01,
            range_width_max: 0.06,
            high_vol_threshold: 0.03,
            flat_momentum_threshold: 0.15,
        }
    }
}

#[derive(Debug)]
pub struct SwingRegimeDetector {
    config: SwingRegimeConfig,
}

impl Default for SwingRegimeDetector {
    fn default() -> Self {
        Self::new(SwingRegimeConfig::default())
    }
}

impl SwingRegimeDetector {
    pub fn new(config: SwingRegimeConfig) -> Self {
        Self { config }
    }

    pub fn min_bars(&self) -> usize {
        self.config.long_ma_period + self.config.range_window
    }

    /// Classify the tail of the series. Returns None on insufficient data.
    pub fn classify(&self, candles: &[Candle]) -> Option<SwingRegime> {
        if candles.len() < self.min_bars() {
            return None;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let current = *closes.last()?;

        // 1. Breakout beats everything: a fresh close beyond the prior range
        match detect_breakout(
            candles,
            self.config.breakout_window,
            self.config.breakout_margin_pct,
        ) {
            Breakout::Up => return Some(SwingRegime::BreakoutUp),
            Breakout::Down => return Some(SwingRegime::BreakoutDown),
            Breakout::None => {}
        }

        let vol = realized_vol_pct(candles, self.config.vol_period).unwrap_or(0.0);
        let high_vol = vol > self.config.high_vol_threshold;

        let momentum = multi_horizon_momentum(&closes, &[(5, 0.4), (20, 0.6)]).unwrap_or(0.0);

        // 2. High volatility with no direction is chop, not a range
        if high_vol && momentum.abs() < self.config.flat_momentum_threshold {
            return Some(SwingRegime::VolatileChop);
        }

        // 3. Narrow oscillating window is a tradeable range
        if let Some(stats) = range_stats(candles, self.config.range_window) {
            if stats.width_pct < self.config.range_width_max
                && stats.upper_touches >= 2
                && stats.lower_touches >= 2
                && momentum.abs() < self.config.flat_momentum_threshold
            {
                return Some(SwingRegime::RangeBound);
            }
        }

        // 4. Moving-average trend
        let short_ma = calculate_sma(&closes, self.config.short_ma_period)?;
        let long_ma = calculate_sma(&closes, self.config.long_ma_period)?;

        if short_ma > long_ma && current > short_ma {
            return Some(SwingRegime::TrendingUp);
        }
        if short_ma < long_ma && current < short_ma {
            return Some(SwingRegime::TrendingDown);
        }

        // 5. Fallback: volatile tape reads as chop, quiet tape as range
        if high_vol {
            Some(SwingRegime::VolatileChop)
        } else {
            Some(SwingRegime::RangeBound)
        }
    }
}
