/// Shared result builder.
///
/// Every concrete engine goes through this so identity/version/tier stamping
/// and the result invariants cannot diverge: confidence is clamped to [0,1],
/// Hold always sizes to zero, take-profits come out nearest-target-first, and
/// the advisory expiry is stamped at generated_at + 24h.
use crate::models::{
    signal_expiry, EngineMetadata, EntryRange, Signal, SignalResult,
};
use chrono::Utc;
use std::collections::HashMap;

pub struct SignalBuilder {
    metadata: EngineMetadata,
    symbol: String,
    signal: Signal,
    confidence: f64,
    position_size_pct: f64,
    entry_range: Option<EntryRange>,
    stop_loss: Option<f64>,
    take_profit: Vec<f64>,
    reference_price: Option<f64>,
    reasoning: Vec<String>,
    extra: HashMap<String, String>,
}

impl SignalBuilder {
    pub fn new(metadata: EngineMetadata, symbol: &str) -> Self {
        Self {
            metadata,
            symbol: symbol.to_string(),
            signal: Signal::Hold,
            confidence: 0.5,
            position_size_pct: 0.0,
            entry_range: None,
            stop_loss: None,
            take_profit: Vec::new(),
            reference_price: None,
            reasoning: Vec::new(),
            extra: HashMap::new(),
        }
    }

    pub fn signal(mut self, signal: Signal) -> Self {
        self.signal = signal;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn position_size_pct(mut self, size: f64) -> Self {
        self.position_size_pct = size;
        self
    }

    pub fn entry_range(mut self, low: f64, high: f64) -> Self {
        self.entry_range = Some(EntryRange { low, high });
        self
    }

    pub fn stop_loss(mut self, stop: f64) -> Self {
        self.stop_loss = Some(stop);
        self
    }

    /// Take-profit targets, ordered nearest `reference_price` first at build
    pub fn take_profits(mut self, targets: Vec<f64>, reference_price: f64) -> Self {
        self.take_profit = targets;
        self.reference_price = Some(reference_price);
        self
    }

    pub fn reason(mut self, line: impl Into<String>) -> Self {
        self.reasoning.push(line.into());
        self
    }

    pub fn reasons(mut self, lines: impl IntoIterator<Item = String>) -> Self {
        self.reasoning.extend(lines);
        self
    }

    pub fn metadata_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> SignalResult {
        let generated_at = Utc::now();

        let mut take_profit = self.take_profit;
        if let Some(price) = self.reference_price {
            take_profit.sort_by(|a, b| {
                (a - price)
                    .abs()
                    .partial_cmp(&(b - price).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let position_size_pct = if self.signal == Signal::Hold {
            0.0
        } else {
            self.position_size_pct
        };

        SignalResult {
            signal_id: uuid::Uuid::new_v4(),
            engine_name: self.metadata.name,
            engine_version: self.metadata.version,
            engine_tier: self.metadata.tier,
            symbol: self.symbol,
            signal: self.signal,
            confidence: self.confidence.clamp(0.0, 1.0),
            position_size_pct,
            timeframe: self.metadata.timeframe,
            entry_range: self.entry_range,
            stop_loss: self.stop_loss,
            take_profit,
            reasoning: self.reasoning,
            metadata: self.extra,
            generated_at,
            expires_at: signal_expiry(generated_at),
        }
    }
}
