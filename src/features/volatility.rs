/// Realized-volatility proxy: Wilder-smoothed true range as a fraction of price
///
/// True Range is the greatest of high-low, |high - prev close|,
/// |low - prev close|. Dividing by the last close gives a scale-free
/// volatility measure comparable across symbols.
use crate::models::Candle;

/// Smoothed true-range over `period` candles, expressed as percent of the
/// last close (e.g. 0.025 = 2.5% daily range).
pub fn realized_vol_pct(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 || period == 0 {
        return None;
    }

    let series = realized_vol_series(candles, period);
    let last_close = candles.last()?.close;
    if last_close <= 0.0 {
        return None;
    }

    series.last().map(|atr| atr / last_close)
}

/// True-range series with Wilder's smoothing, aligned to the candle tail
pub fn realized_vol_series(candles: &[Candle], period: usize) -> Vec<f64> {
    if candles.len() < period + 1 || period == 0 {
        return Vec::new();
    }

    let mut true_ranges = Vec::with_capacity(candles.len() - 1);
    for i in 1..candles.len() {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        true_ranges.push(tr);
    }

    let mut series = Vec::new();
    let first: f64 = true_ranges.iter().take(period).sum::<f64>() / period as f64;
    series.push(first);

    let mut atr = first;
    for tr in &true_ranges[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        series.push(atr);
    }

    series
}

/// Ratio of current smoothed range to its average over `lookback` values.
///
/// > 1.0 means volatility is expanding; used both as a stage-B factor and as
/// the rising-vol split in the leveraged state machine.
pub fn vol_expansion_ratio(candles: &[Candle], period: usize, lookback: usize) -> Option<f64> {
    let series = realized_vol_series(candles, period);
    if series.len() < lookback || lookback == 0 {
        return None;
    }

    let current = *series.last()?;
    let window = &series[series.len() - lookback..];
    let avg = window.iter().sum::<f64>() / window.len() as f64;

    if avg <= 0.0 {
        return None;
    }
    Some(current / avg)
}
