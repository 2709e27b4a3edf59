/// Correlation of aligned daily-return series
///
/// Used by leverage-aware engines to confirm the instrument actually tracks
/// its underlying index before trusting a trend state.
use crate::models::Candle;
use std::collections::HashMap;

/// Minimum paired observations before a correlation is meaningful;
/// below this the value is treated as zero (undefined).
pub const MIN_CORRELATION_OBSERVATIONS: usize = 10;

/// Close-to-close returns keyed by calendar day
pub fn daily_returns(candles: &[Candle]) -> HashMap<chrono::NaiveDate, f64> {
    let mut returns = HashMap::new();
    for pair in candles.windows(2) {
        let prev = pair[0].close;
        if prev <= 0.0 {
            continue;
        }
        let date = pair[1].timestamp.date_naive();
        returns.insert(date, (pair[1].close - prev) / prev);
    }
    returns
}

/// Pearson correlation of the two series' returns on shared days.
///
/// Returns 0.0 when fewer than `MIN_CORRELATION_OBSERVATIONS` days overlap or
/// either series is degenerate (zero variance).
pub fn pearson_correlation(series_a: &[Candle], series_b: &[Candle]) -> f64 {
    let returns_a = daily_returns(series_a);
    let returns_b = daily_returns(series_b);

    let mut paired: Vec<(f64, f64)> = returns_a
        .iter()
        .filter_map(|(date, &ra)| returns_b.get(date).map(|&rb| (ra, rb)))
        .collect();

    if paired.len() < MIN_CORRELATION_OBSERVATIONS {
        return 0.0;
    }

    // Deterministic order not required for the sums, but keeps debugging sane
    paired.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(std::cmp::Ordering::Equal));

    let n = paired.len() as f64;
    let mean_a = paired.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = paired.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (ra, rb) in &paired {
        let da = ra - mean_a;
        let db = rb - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }

    cov / (var_a.sqrt() * var_b.sqrt())
}
