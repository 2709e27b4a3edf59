/// Rate of change over the last `bars` closes, as a signed fraction
pub fn rate_of_change(prices: &[f64], bars: usize) -> Option<f64> {
    if prices.len() < bars + 1 || bars == 0 {
        return None;
    }

    let current = *prices.last()?;
    let past = prices[prices.len() - 1 - bars];
    if past <= 0.0 {
        return None;
    }

    Some((current - past) / past)
}

/// Weighted multi-horizon momentum in [-1, 1].
///
/// Each (bars, weight) horizon contributes its tanh-squashed rate of change;
/// horizons the series is too short for contribute nothing (weight drops out
/// of the normalisation rather than counting as zero momentum).
pub fn multi_horizon_momentum(prices: &[f64], horizons: &[(usize, f64)]) -> Option<f64> {
    let mut score = 0.0;
    let mut total_weight = 0.0;

    for &(bars, weight) in horizons {
        if let Some(roc) = rate_of_change(prices, bars) {
            // Squash so a ~10% move saturates a single horizon
            score += (roc * 10.0).tanh() * weight;
            total_weight += weight;
        }
    }

    if total_weight <= 0.0 {
        return None;
    }
    Some(score / total_weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_of_change() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let roc = rate_of_change(&prices, 5).unwrap();
        assert!((roc - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_rate_of_change_too_short() {
        let prices = vec![100.0, 110.0];
        assert!(rate_of_change(&prices, 5).is_none());
    }

    #[test]
    fn test_momentum_uptrend_positive() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let score = multi_horizon_momentum(&prices, &[(5, 0.5), (20, 0.5)]).unwrap();
        assert!(score > 0.3, "uptrend score {}", score);
    }

    #[test]
    fn test_momentum_downtrend_negative() {
        let prices: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        let score = multi_horizon_momentum(&prices, &[(5, 0.5), (20, 0.5)]).unwrap();
        assert!(score < -0.3, "downtrend score {}", score);
    }

    #[test]
    fn test_momentum_skips_unavailable_horizons() {
        // Only the 5-bar horizon fits; the 60-bar weight must drop out
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let score = multi_horizon_momentum(&prices, &[(5, 0.3), (60, 0.7)]).unwrap();
        assert!(score > 0.0);
    }

    #[test]
    fn test_momentum_none_when_nothing_fits() {
        let prices = vec![100.0, 101.0];
        assert!(multi_horizon_momentum(&prices, &[(20, 1.0)]).is_none());
    }
}
