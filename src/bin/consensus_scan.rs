/// Consensus Scanner Demo
///
/// Generates synthetic daily candles for a handful of symbols, routes each
/// through the engine selector, then runs the full aggregator and prints the
/// consensus verdict with conflicts and the per-regime recommendation.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use signalmesh::engine::selector::EngineChoice;
use signalmesh::{
    Candle, EngineSelector, FundamentalSet, IndicatorSet, MarketContext, MarketData,
    SignalAggregator,
};

/// Random walk with drift, plus a shared index and a VIX-like series
fn synthetic_market(symbol: &str, drift: f64, vix_level: f64, rng: &mut StdRng) -> MarketData {
    let start = Utc::now() - Duration::days(130);
    let mut price = 100.0;
    let mut index = 15_000.0;

    let mut candles = Vec::with_capacity(130);
    let mut index_candles = Vec::with_capacity(130);
    let mut vix_candles = Vec::with_capacity(130);

    for day in 0..130 {
        let timestamp = start + Duration::days(day);
        let shock: f64 = rng.gen_range(-0.01..0.01);
        let index_move = drift / 3.0 + shock / 3.0;

        price *= 1.0 + drift + shock;
        index *= 1.0 + index_move;

        candles.push(Candle {
            symbol: symbol.to_string(),
            timestamp,
            open: price * 0.998,
            high: price * 1.006,
            low: price * 0.994,
            close: price,
            volume: rng.gen_range(1_000_000.0..9_000_000.0),
        });
        index_candles.push(Candle {
            symbol: "NDX".to_string(),
            timestamp,
            open: index * 0.999,
            high: index * 1.003,
            low: index * 0.997,
            close: index,
            volume: 0.0,
        });
        let vix = vix_level + rng.gen_range(-1.5..1.5);
        vix_candles.push(Candle {
            symbol: "VIX".to_string(),
            timestamp,
            open: vix,
            high: vix + 0.5,
            low: vix - 0.5,
            close: vix,
            volume: 0.0,
        });
    }

    MarketData::new(candles).with_reference_series(index_candles, vix_candles)
}

fn synthetic_indicators(data: &MarketData, rng: &mut StdRng) -> IndicatorSet {
    let closes: Vec<f64> = data.candles.iter().map(|c| c.close).collect();
    let last = *closes.last().unwrap_or(&100.0);
    let prior = closes.get(closes.len().saturating_sub(6)).copied().unwrap_or(last);

    // RSI proxy from the recent move, enough to exercise the oscillators
    let rsi = (50.0 + ((last / prior) - 1.0) * 600.0).clamp(10.0, 90.0);

    let mut set = IndicatorSet::default();
    set.insert("rsi", rsi);
    set.insert("rsi_prev", rsi - rng.gen_range(-4.0..4.0));
    set.insert("atr", last * 0.015);
    set.insert("macd", (last - prior) * 0.3);
    set.insert("macd_signal", (last - prior) * 0.2);
    set.insert("bb_width", 0.05 + rng.gen_range(0.0..0.03));
    set.insert("sma_200", last * rng.gen_range(0.9..1.05));
    set
}

fn synthetic_fundamentals(rng: &mut StdRng) -> FundamentalSet {
    let mut set = FundamentalSet::default();
    set.insert("pe_ratio", rng.gen_range(12.0..40.0));
    set.insert("earnings_growth", rng.gen_range(-0.05..0.30));
    set.insert("net_margin", rng.gen_range(0.02..0.28));
    set.insert("revenue_growth", rng.gen_range(-0.05..0.25));
    set
}

fn print_choice(symbol: &str, choice: &EngineChoice) {
    println!("  {} -> {}", symbol, choice.engine_name);
    println!("     {}", choice.rationale);
    for warning in &choice.warnings {
        println!("     ⚠ {}", warning);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              CONSENSUS SCANNER DEMO                   ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    // Seeded so reruns produce the same narrative
    let mut rng = StdRng::seed_from_u64(42);

    let selector = EngineSelector::new();
    let aggregator = SignalAggregator::with_default_engines();
    let context = MarketContext::neutral(Utc::now());

    let universe = [
        ("NVDA", 0.004, 17.0),
        ("AAPL", 0.001, 17.0),
        ("XOM", -0.003, 21.0),
        ("TQQQ", 0.006, 19.0),
    ];

    println!("═══════════════ ENGINE ROUTING ═══════════════\n");
    for (symbol, _, _) in &universe {
        print_choice(symbol, &selector.select(symbol));
    }

    println!("\n═══════════════ CONSENSUS SCAN ═══════════════");
    for (symbol, drift, vix) in &universe {
        let data = synthetic_market(symbol, *drift, *vix, &mut rng);
        let indicators = synthetic_indicators(&data, &mut rng);
        let fundamentals = synthetic_fundamentals(&mut rng);

        println!("\n📊 {}", symbol);
        match aggregator.aggregate(symbol, &data, &indicators, &fundamentals, &context) {
            Ok(result) => {
                println!(
                    "  Consensus: {} (confidence {:.2}), recommended engine: {}",
                    result.consensus_signal.as_str(),
                    result.consensus_confidence,
                    result.recommended_engine
                );
                for (name, engine_result) in &result.engine_results {
                    println!(
                        "    {:<10} {} conf {:.2} size {:+.2}%",
                        name,
                        engine_result.signal.as_str(),
                        engine_result.confidence,
                        engine_result.position_size_pct
                    );
                }
                if result.conflicts.is_empty() {
                    println!("  No conflicts");
                } else {
                    for conflict in &result.conflicts {
                        println!("  ⚠ Conflict — {}", conflict);
                    }
                }
                let comparison = aggregator.compare(&result);
                println!(
                    "  Confidence spread: {:.2} .. {:.2} (mean {:.2})",
                    comparison.min_confidence,
                    comparison.max_confidence,
                    comparison.mean_confidence
                );
                if std::env::var("DUMP_JSON").is_ok() {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
            }
            Err(err) => println!("  ❌ aggregation failed: {}", err),
        }
    }

    println!("\n═══════════════════════════════════════════════\n");
    Ok(())
}
