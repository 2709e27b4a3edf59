/// Range-vs-breakout tests over a recent candle window
use crate::models::Candle;

/// Summary of the recent trading range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeStats {
    pub high: f64,
    pub low: f64,
    /// (high - low) / mid, as a fraction
    pub width_pct: f64,
    pub upper_touches: usize,
    pub lower_touches: usize,
}

/// Breakout classification of the latest close against the prior window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakout {
    None,
    Up,
    Down,
}

/// Compute range statistics over the last `window` candles.
///
/// Touch counts use bands at 25% from each range edge, so an oscillating
/// range shows touches on both sides while a drifting series does not.
pub fn range_stats(candles: &[Candle], window: usize) -> Option<RangeStats> {
    if candles.len() < window || window < 2 {
        return None;
    }

    let recent = &candles[candles.len() - window..];
    let closes: Vec<f64> = recent.iter().map(|c| c.close).collect();

    let high = closes.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let low = closes.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let mid = (high + low) / 2.0;
    if mid <= 0.0 {
        return None;
    }

    let band = (high - low) * 0.25;
    let upper_touches = closes.iter().filter(|&&p| p >= high - band).count();
    let lower_touches = closes.iter().filter(|&&p| p <= low + band).count();

    Some(RangeStats {
        high,
        low,
        width_pct: (high - low) / mid,
        upper_touches,
        lower_touches,
    })
}

/// Test the latest close against the high/low of the `window` candles
/// before it. A close beyond the prior extreme by `margin_pct` is a breakout.
pub fn detect_breakout(candles: &[Candle], window: usize, margin_pct: f64) -> Breakout {
    if candles.len() < window + 1 {
        return Breakout::None;
    }

    let current = candles[candles.len() - 1].close;
    let prior = &candles[candles.len() - 1 - window..candles.len() - 1];

    let prior_high = prior.iter().map(|c| c.close).fold(f64::NEG_INFINITY, f64::max);
    let prior_low = prior.iter().map(|c| c.close).fold(f64::INFINITY, f64::min);

    if current > prior_high * (1.0 + margin_pct) {
        Breakout::Up
    } else if current < prior_low * (1.0 - margin_pct) {
        Breakout::Down
    } else {
        Breakout::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                symbol: "TEST".to_string(),
                timestamp: Utc::now() + chrono::Duration::days(i as i64),
                open: close,
                high: close * 1.005,
                low: close * 0.995,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_range_stats_oscillating() {
        let closes: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 100.0 } else { 104.0 })
            .collect();
        let candles = candles_from_closes(&closes);

        let stats = range_stats(&candles, 20).unwrap();
        assert!((stats.width_pct - 0.0392).abs() < 0.001);
        assert!(stats.upper_touches >= 5);
        assert!(stats.lower_touches >= 5);
    }

    #[test]
    fn test_range_stats_insufficient() {
        let candles = candles_from_closes(&[100.0, 101.0]);
        assert!(range_stats(&candles, 10).is_none());
    }

    #[test]
    fn test_breakout_up() {
        let mut closes = vec![100.0; 15];
        closes.push(103.0);
        let candles = candles_from_closes(&closes);

        assert_eq!(detect_breakout(&candles, 15, 0.01), Breakout::Up);
    }

    #[test]
    fn test_breakout_down() {
        let mut closes = vec![100.0; 15];
        closes.push(97.0);
        let candles = candles_from_closes(&closes);

        assert_eq!(detect_breakout(&candles, 15, 0.01), Breakout::Down);
    }

    #[test]
    fn test_no_breakout_inside_range() {
        let mut closes = vec![100.0; 15];
        closes.push(100.5);
        let candles = candles_from_closes(&closes);

        assert_eq!(detect_breakout(&candles, 15, 0.01), Breakout::None);
    }
}
