//! Multi-engine consensus for one symbol.
//!
//! Runs a subset of registered engines against the same inputs, then reduces
//! the surviving results to a majority-vote signal, an agreement-adjusted
//! confidence, conflict descriptions, and a per-regime engine recommendation.
//! One engine failing never aborts the batch; the call fails only when every
//! engine does.

use crate::engine::EngineFactory;
use crate::error::{EngineError, Result};
use crate::models::{
    AggregatedSignalResult, FundamentalSet, IndicatorSet, MacroRegime, MarketContext, MarketData,
    Signal, SignalResult,
};
use chrono::Utc;
use std::collections::HashMap;

/// Engines drop out of the regime preference walk below this confidence
const RECOMMENDATION_CONFIDENCE_FLOOR: f64 = 0.4;
/// Agreement ratio at or above this boosts consensus confidence x1.1
const STRONG_AGREEMENT_RATIO: f64 = 0.75;
/// Agreement ratio at or below this discounts consensus confidence x0.8
const WEAK_AGREEMENT_RATIO: f64 = 0.25;
/// Confidence spread beyond this emits a high/low split conflict
const CONFIDENCE_SPLIT_GAP: f64 = 0.4;

/// Which engine to trust first, per macro regime. Walked in order during
/// recommendation; first present engine above the confidence floor wins.
fn regime_preference(regime: MacroRegime) -> &'static [&'static str] {
    match regime {
        MacroRegime::Bull => &["momentum", "swing", "leveraged", "value"],
        MacroRegime::Bear => &["value", "swing", "leveraged", "momentum"],
        MacroRegime::HighVolChop => &["swing", "value", "momentum", "leveraged"],
        MacroRegime::NoTrade => &["value", "swing", "momentum", "leveraged"],
    }
}

/// Read-only summary of an aggregation run for human review
#[derive(Debug, Clone)]
pub struct EngineComparison {
    pub symbol: String,
    /// Signal -> engines that voted for it, names sorted
    pub signal_distribution: Vec<(Signal, Vec<String>)>,
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub mean_confidence: f64,
}

pub struct SignalAggregator {
    factory: EngineFactory,
}

impl SignalAggregator {
    pub fn new(factory: EngineFactory) -> Self {
        Self { factory }
    }

    pub fn with_default_engines() -> Self {
        Self::new(EngineFactory::with_defaults())
    }

    /// Run every registered engine and reduce to a consensus
    pub fn aggregate(
        &self,
        symbol: &str,
        market_data: &MarketData,
        indicators: &IndicatorSet,
        fundamentals: &FundamentalSet,
        context: &MarketContext,
    ) -> Result<AggregatedSignalResult> {
        let names = self.factory.engine_names();
        self.aggregate_subset(symbol, market_data, indicators, fundamentals, context, &names)
    }

    /// Run a named subset of engines and reduce to a consensus.
    ///
    /// A per-engine failure is logged and skipped; the call itself fails only
    /// when zero engines succeed, carrying every collected failure message.
    pub fn aggregate_subset(
        &self,
        symbol: &str,
        market_data: &MarketData,
        indicators: &IndicatorSet,
        fundamentals: &FundamentalSet,
        context: &MarketContext,
        engine_names: &[String],
    ) -> Result<AggregatedSignalResult> {
        let mut engine_results: HashMap<String, SignalResult> = HashMap::new();
        let mut failures: Vec<String> = Vec::new();

        for name in engine_names {
            let outcome = self.factory.get_engine(name).and_then(|engine| {
                engine.generate_signal(symbol, market_data, indicators, fundamentals, context)
            });
            match outcome {
                Ok(result) => {
                    tracing::debug!(
                        engine = %name,
                        symbol = %symbol,
                        signal = result.signal.as_str(),
                        confidence = result.confidence,
                        "engine result collected"
                    );
                    engine_results.insert(result.engine_name.clone(), result);
                }
                Err(err) => {
                    tracing::warn!(engine = %name, symbol = %symbol, error = %err, "engine failed, continuing batch");
                    failures.push(format!("{}: {}", name, err));
                }
            }
        }

        if engine_results.is_empty() {
            return Err(EngineError::AllEnginesFailed {
                symbol: symbol.to_string(),
                failures,
            });
        }

        let consensus_signal = Self::consensus_signal(&engine_results);
        let consensus_confidence = Self::consensus_confidence(&engine_results, consensus_signal);
        let conflicts = Self::detect_conflicts(&engine_results);
        let recommended_engine = Self::recommend_engine(&engine_results, context.regime);
        let combined_reasoning = Self::combine_reasoning(&engine_results);

        tracing::info!(
            symbol = %symbol,
            consensus = consensus_signal.as_str(),
            confidence = consensus_confidence,
            engines = engine_results.len(),
            failed = failures.len(),
            recommended = %recommended_engine,
            "aggregation complete"
        );

        Ok(AggregatedSignalResult {
            symbol: symbol.to_string(),
            consensus_signal,
            consensus_confidence,
            recommended_engine,
            engine_results,
            conflicts,
            combined_reasoning,
            generated_at: Utc::now(),
        })
    }

    /// Signal distribution and confidence stats, no mutation
    pub fn compare(&self, aggregated: &AggregatedSignalResult) -> EngineComparison {
        let results = &aggregated.engine_results;
        let confidences: Vec<f64> = results.values().map(|r| r.confidence).collect();
        let mean = confidences.iter().sum::<f64>() / confidences.len().max(1) as f64;

        let mut distribution: Vec<(Signal, Vec<String>)> = Vec::new();
        for signal in [Signal::Buy, Signal::Hold, Signal::Sell] {
            let mut voters: Vec<String> = results
                .iter()
                .filter(|(_, r)| r.signal == signal)
                .map(|(name, _)| name.clone())
                .collect();
            if voters.is_empty() {
                continue;
            }
            voters.sort();
            distribution.push((signal, voters));
        }

        EngineComparison {
            symbol: aggregated.symbol.clone(),
            signal_distribution: distribution,
            min_confidence: confidences.iter().cloned().fold(f64::INFINITY, f64::min),
            max_confidence: confidences.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            mean_confidence: mean,
        }
    }

    /// Majority vote over the three categories, ties broken by enum order
    fn consensus_signal(results: &HashMap<String, SignalResult>) -> Signal {
        let mut best = Signal::Hold;
        let mut best_count = 0usize;
        for candidate in [Signal::Buy, Signal::Hold, Signal::Sell] {
            let count = results.values().filter(|r| r.signal == candidate).count();
            // Strict > keeps the earliest enum variant on ties
            if count > best_count {
                best = candidate;
                best_count = count;
            }
        }
        best
    }

    /// Mean confidence, boosted or discounted by agreement strength
    fn consensus_confidence(results: &HashMap<String, SignalResult>, consensus: Signal) -> f64 {
        let total = results.len() as f64;
        let mean = results.values().map(|r| r.confidence).sum::<f64>() / total;
        let agreeing = results.values().filter(|r| r.signal == consensus).count() as f64;
        let ratio = agreeing / total;

        if ratio >= STRONG_AGREEMENT_RATIO {
            (mean * 1.1).min(1.0)
        } else if ratio <= WEAK_AGREEMENT_RATIO {
            mean * 0.8
        } else {
            mean
        }
    }

    /// One line per distinct signal when engines disagree, plus a
    /// high/low-confidence split when the spread exceeds the gap threshold
    fn detect_conflicts(results: &HashMap<String, SignalResult>) -> Vec<String> {
        let mut conflicts = Vec::new();

        let distinct: Vec<Signal> = [Signal::Buy, Signal::Hold, Signal::Sell]
            .into_iter()
            .filter(|s| results.values().any(|r| r.signal == *s))
            .collect();

        if distinct.len() > 1 {
            for signal in &distinct {
                let mut voters: Vec<String> = results
                    .iter()
                    .filter(|(_, r)| r.signal == *signal)
                    .map(|(name, r)| format!("{} ({:.2})", name, r.confidence))
                    .collect();
                voters.sort();
                conflicts.push(format!("{}: {}", signal.as_str(), voters.join(", ")));
            }
        }

        let max = results.values().map(|r| r.confidence).fold(f64::NEG_INFINITY, f64::max);
        let min = results.values().map(|r| r.confidence).fold(f64::INFINITY, f64::min);
        if max - min > CONFIDENCE_SPLIT_GAP {
            let midpoint = (max + min) / 2.0;
            let mut high: Vec<String> = results
                .iter()
                .filter(|(_, r)| r.confidence >= midpoint)
                .map(|(name, r)| format!("{} ({:.2})", name, r.confidence))
                .collect();
            let mut low: Vec<String> = results
                .iter()
                .filter(|(_, r)| r.confidence < midpoint)
                .map(|(name, r)| format!("{} ({:.2})", name, r.confidence))
                .collect();
            high.sort();
            low.sort();
            conflicts.push(format!("High confidence: {}", high.join(", ")));
            conflicts.push(format!("Low confidence: {}", low.join(", ")));
        }

        conflicts
    }

    /// First engine in the regime's preference order with confidence above
    /// the floor; fallback to the single highest-confidence engine
    fn recommend_engine(results: &HashMap<String, SignalResult>, regime: MacroRegime) -> String {
        for preferred in regime_preference(regime) {
            if let Some(result) = results.get(*preferred) {
                if result.confidence > RECOMMENDATION_CONFIDENCE_FLOOR {
                    return preferred.to_string();
                }
            }
        }

        results
            .iter()
            .max_by(|(name_a, a), (name_b, b)| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    // Stable fallback when confidences tie exactly
                    .then_with(|| name_b.cmp(name_a))
            })
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    }

    /// Headline line per engine, names sorted for a stable narrative
    fn combine_reasoning(results: &HashMap<String, SignalResult>) -> Vec<String> {
        let mut names: Vec<&String> = results.keys().collect();
        names.sort();

        let mut combined = Vec::new();
        for name in names {
            let result = &results[name];
            combined.push(format!(
                "[{}] {} (confidence {:.2}, size {:.2}%)",
                name,
                result.signal.as_str(),
                result.confidence,
                result.position_size_pct
            ));
            if let Some(first) = result.reasoning.first() {
                combined.push(format!("[{}] {}", name, first));
            }
        }
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SignalEngine;
    use crate::error::EngineError;
    use crate::models::{Candle, EngineMetadata, EngineTier, SwingRegime};
    use crate::models::signal_expiry;
    use std::sync::Arc;

    #[derive(Debug)]
    struct FixedEngine {
        name: &'static str,
        signal: Signal,
        confidence: f64,
    }

    impl SignalEngine for FixedEngine {
        fn generate_signal(
            &self,
            symbol: &str,
            _market_data: &MarketData,
            _indicators: &IndicatorSet,
            _fundamentals: &FundamentalSet,
            _context: &MarketContext,
        ) -> crate::error::Result<SignalResult> {
            let now = Utc::now();
            Ok(SignalResult {
                signal_id: uuid::Uuid::new_v4(),
                engine_name: self.name.to_string(),
                engine_version: "0.0.0".to_string(),
                engine_tier: EngineTier::Basic,
                symbol: symbol.to_string(),
                signal: self.signal,
                confidence: self.confidence,
                position_size_pct: if self.signal == Signal::Hold { 0.0 } else { 5.0 },
                timeframe: "test".to_string(),
                entry_range: None,
                stop_loss: None,
                take_profit: Vec::new(),
                reasoning: vec![format!("Regime {}: fixture", SwingRegime::RangeBound.as_str())],
                metadata: HashMap::new(),
                generated_at: now,
                expires_at: signal_expiry(now),
            })
        }

        fn metadata(&self) -> EngineMetadata {
            EngineMetadata {
                name: self.name.to_string(),
                tier: EngineTier::Basic,
                timeframe: "test".to_string(),
                version: "0.0.0".to_string(),
                features: Vec::new(),
            }
        }

        fn required_indicators(&self) -> Vec<String> {
            Vec::new()
        }

        fn min_bars(&self) -> usize {
            1
        }
    }

    #[derive(Debug)]
    struct FailingEngine {
        name: &'static str,
    }

    impl SignalEngine for FailingEngine {
        fn generate_signal(
            &self,
            symbol: &str,
            _market_data: &MarketData,
            _indicators: &IndicatorSet,
            _fundamentals: &FundamentalSet,
            _context: &MarketContext,
        ) -> crate::error::Result<SignalResult> {
            Err(EngineError::insufficient_data(self.name, symbol, "fixture failure"))
        }

        fn metadata(&self) -> EngineMetadata {
            EngineMetadata {
                name: self.name.to_string(),
                tier: EngineTier::Basic,
                timeframe: "test".to_string(),
                version: "0.0.0".to_string(),
                features: Vec::new(),
            }
        }

        fn required_indicators(&self) -> Vec<String> {
            Vec::new()
        }

        fn min_bars(&self) -> usize {
            1
        }
    }

    fn fixture_factory(entries: &[(&'static str, Signal, f64)]) -> EngineFactory {
        let factory = EngineFactory::new();
        for (name, signal, confidence) in entries.iter().copied() {
            factory
                .register(name, move || {
                    Ok(Arc::new(FixedEngine { name, signal, confidence }))
                })
                .unwrap();
        }
        factory
    }

    fn market_data() -> MarketData {
        MarketData::new(vec![Candle {
            symbol: "TEST".to_string(),
            timestamp: Utc::now(),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1000.0,
        }])
    }

    fn aggregate_all(factory: EngineFactory) -> AggregatedSignalResult {
        let aggregator = SignalAggregator::new(factory);
        aggregator
            .aggregate(
                "TEST",
                &market_data(),
                &IndicatorSet::default(),
                &FundamentalSet::default(),
                &MarketContext::neutral(Utc::now()),
            )
            .unwrap()
    }

    #[test]
    fn test_majority_vote_with_mid_agreement_keeps_mean() {
        // 2/3 agreement: neither the boost nor the discount applies
        let factory = fixture_factory(&[
            ("alpha", Signal::Buy, 0.8),
            ("beta", Signal::Buy, 0.6),
            ("gamma", Signal::Sell, 0.5),
        ]);
        let result = aggregate_all(factory);

        assert_eq!(result.consensus_signal, Signal::Buy);
        assert!((result.consensus_confidence - 0.6333333).abs() < 1e-6);
    }

    #[test]
    fn test_unanimous_agreement_boosts_confidence() {
        let factory = fixture_factory(&[
            ("alpha", Signal::Buy, 0.7),
            ("beta", Signal::Buy, 0.7),
            ("gamma", Signal::Buy, 0.7),
            ("delta", Signal::Buy, 0.7),
        ]);
        let result = aggregate_all(factory);
        assert!((result.consensus_confidence - 0.77).abs() < 1e-9);
    }

    #[test]
    fn test_boosted_confidence_caps_at_one() {
        let factory = fixture_factory(&[
            ("alpha", Signal::Buy, 0.95),
            ("beta", Signal::Buy, 0.95),
        ]);
        let result = aggregate_all(factory);
        assert_eq!(result.consensus_confidence, 1.0);
    }

    #[test]
    fn test_tie_breaks_by_signal_order() {
        // Buy and Sell each get one vote; Buy wins by enum order
        let factory = fixture_factory(&[
            ("alpha", Signal::Sell, 0.6),
            ("beta", Signal::Buy, 0.6),
        ]);
        let result = aggregate_all(factory);
        assert_eq!(result.consensus_signal, Signal::Buy);
    }

    #[test]
    fn test_one_failure_does_not_abort_batch() {
        let factory = fixture_factory(&[
            ("alpha", Signal::Buy, 0.7),
            ("beta", Signal::Buy, 0.6),
        ]);
        factory
            .register("broken", || Ok(Arc::new(FailingEngine { name: "broken" })))
            .unwrap();

        let result = aggregate_all(factory);
        assert_eq!(result.engine_results.len(), 2);
        assert!(result.engine_results.contains_key("alpha"));
        assert!(result.engine_results.contains_key("beta"));
        assert!(!result.engine_results.contains_key("broken"));
    }

    #[test]
    fn test_total_failure_surfaces_every_message() {
        let factory = EngineFactory::new();
        factory
            .register("first", || Ok(Arc::new(FailingEngine { name: "first" })))
            .unwrap();
        factory
            .register("second", || Ok(Arc::new(FailingEngine { name: "second" })))
            .unwrap();

        let aggregator = SignalAggregator::new(factory);
        let err = aggregator
            .aggregate(
                "TEST",
                &market_data(),
                &IndicatorSet::default(),
                &FundamentalSet::default(),
                &MarketContext::neutral(Utc::now()),
            )
            .unwrap_err();

        let msg = err.to_string();
        assert!(matches!(err, EngineError::AllEnginesFailed { .. }));
        assert!(msg.contains("first"));
        assert!(msg.contains("second"));
    }

    #[test]
    fn test_confidence_split_emits_high_and_low_lines() {
        // Gap 0.7 > 0.4 forces the split lines even with signal agreement
        let factory = fixture_factory(&[
            ("alpha", Signal::Buy, 0.9),
            ("beta", Signal::Buy, 0.2),
        ]);
        let result = aggregate_all(factory);

        assert!(result.conflicts.iter().any(|c| c.starts_with("High confidence") && c.contains("alpha")));
        assert!(result.conflicts.iter().any(|c| c.starts_with("Low confidence") && c.contains("beta")));
    }

    #[test]
    fn test_disagreement_emits_one_line_per_signal() {
        let factory = fixture_factory(&[
            ("alpha", Signal::Buy, 0.7),
            ("beta", Signal::Sell, 0.6),
            ("gamma", Signal::Hold, 0.5),
        ]);
        let result = aggregate_all(factory);

        let buy_line = result.conflicts.iter().find(|c| c.starts_with("BUY")).unwrap();
        assert!(buy_line.contains("alpha (0.70)"));
        assert!(result.conflicts.iter().any(|c| c.starts_with("HOLD")));
        assert!(result.conflicts.iter().any(|c| c.starts_with("SELL")));
    }

    #[test]
    fn test_recommendation_walks_regime_preference() {
        // Bull prefers momentum first; it clears the 0.4 floor
        let factory = fixture_factory(&[
            ("momentum", Signal::Buy, 0.5),
            ("swing", Signal::Buy, 0.9),
        ]);
        let result = aggregate_all(factory);
        assert_eq!(result.recommended_engine, "momentum");
    }

    #[test]
    fn test_recommendation_falls_back_to_highest_confidence() {
        // Nothing in the preference walk clears the floor
        let factory = fixture_factory(&[
            ("momentum", Signal::Hold, 0.3),
            ("other", Signal::Buy, 0.35),
        ]);
        let result = aggregate_all(factory);
        assert_eq!(result.recommended_engine, "other");
    }

    #[test]
    fn test_subset_runs_only_named_engines() {
        let factory = fixture_factory(&[
            ("alpha", Signal::Buy, 0.7),
            ("beta", Signal::Sell, 0.6),
        ]);
        let aggregator = SignalAggregator::new(factory);
        let result = aggregator
            .aggregate_subset(
                "TEST",
                &market_data(),
                &IndicatorSet::default(),
                &FundamentalSet::default(),
                &MarketContext::neutral(Utc::now()),
                &["alpha".to_string()],
            )
            .unwrap();

        assert_eq!(result.engine_results.len(), 1);
        assert_eq!(result.consensus_signal, Signal::Buy);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_comparison_summarizes_distribution() {
        let factory = fixture_factory(&[
            ("alpha", Signal::Buy, 0.8),
            ("beta", Signal::Buy, 0.6),
            ("gamma", Signal::Sell, 0.5),
        ]);
        let aggregator = SignalAggregator::new(factory);
        let result = aggregator
            .aggregate(
                "TEST",
                &market_data(),
                &IndicatorSet::default(),
                &FundamentalSet::default(),
                &MarketContext::neutral(Utc::now()),
            )
            .unwrap();

        let comparison = aggregator.compare(&result);
        assert_eq!(comparison.signal_distribution.len(), 2);
        let (signal, voters) = &comparison.signal_distribution[0];
        assert_eq!(*signal, Signal::Buy);
        assert_eq!(voters, &vec!["alpha".to_string(), "beta".to_string()]);
        assert!((comparison.mean_confidence - 0.6333333).abs() < 1e-6);
        assert_eq!(comparison.min_confidence, 0.5);
        assert_eq!(comparison.max_confidence, 0.8);
    }
}
