use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::application::analysis;
use crate::application::signal_combiner::{self, CombinerInputs, CurrencySubSignal, GlobalSubSignal, GramSubSignal};
use crate::domain::analysis::record::{AnalysisRecord, CurrencyRiskLevel, SignalDirection, SignalRecord, SignalStrength};
use crate::domain::analysis::sub_analysis::SubAnalysis;
use crate::domain::indicators::bollinger::bollinger;
use crate::domain::indicators::macd::macd;
use crate::domain::indicators::moving_average::sma;
use crate::domain::indicators::rsi::rsi;
use crate::domain::indicators::stochastic::stochastic;
use crate::domain::market::candle::Candle;
use crate::domain::market::quote::MarketSnapshot;
use crate::domain::market::regime::{Direction, VolatilityRegime};
use crate::domain::market::timeframe::Timeframe;

const MIN_GRAM_CANDLES: usize = 20;

fn clamp_unit(v: Decimal) -> Decimal {
    v.max(-Decimal::ONE).min(Decimal::ONE)
}

/// Weighted vote over momentum/mean-reversion indicators, direction score
/// in `[-1, 1]` plus a confidence derived from how many indicators agree.
fn gram_sub_signal(candles: &[Candle]) -> GramSubSignal {
    let mut votes: Vec<Decimal> = Vec::new();

    if let Ok(rsi_value) = rsi(candles, 14) {
        votes.push(clamp_unit((rsi_value - dec!(50)) / dec!(50)));
    }
    if let Ok(macd_out) = macd(candles, 12, 26, 9) {
        let scale = candles.last().map(|c| c.close).filter(|c| *c != Decimal::ZERO).unwrap_or(Decimal::ONE);
        votes.push(clamp_unit(macd_out.histogram / scale * dec!(50)));
    }
    if let Ok(boll) = bollinger(candles, 20) {
        votes.push(clamp_unit((boll.position - dec!(0.5)) * Decimal::TWO));
    }
    if let Ok(stoch) = stochastic(candles, 14, 3) {
        votes.push(clamp_unit((stoch.k - dec!(50)) / dec!(50)));
    }

    if votes.is_empty() {
        return GramSubSignal { direction: SignalDirection::Hold, score: Decimal::ZERO, confidence: Decimal::ZERO };
    }

    let score = votes.iter().sum::<Decimal>() / Decimal::from(votes.len());
    let agreeing = votes.iter().filter(|v| v.signum() == score.signum() || **v == Decimal::ZERO).count();
    let agreement_ratio = Decimal::from(agreeing) / Decimal::from(votes.len());
    let magnitude = score.abs();
    let confidence = clamp_unit(agreement_ratio * (dec!(0.5) + magnitude * dec!(0.5))).max(Decimal::ZERO);

    let direction = if score > dec!(0.1) {
        SignalDirection::Buy
    } else if score < -dec!(0.1) {
        SignalDirection::Sell
    } else {
        SignalDirection::Hold
    };

    GramSubSignal { direction, score, confidence }
}

/// Long-horizon SMA-cross read over the ounce/USD series: direction,
/// strength (distance between fast/slow SMA as a fraction of price) and
/// momentum (RSI).
fn global_sub_signal(ounce_usd_candles: &[Candle]) -> GlobalSubSignal {
    let fast = sma(ounce_usd_candles, 10.min(ounce_usd_candles.len().max(1)));
    let slow = sma(ounce_usd_candles, 30.min(ounce_usd_candles.len().max(1)));
    let momentum = rsi(ounce_usd_candles, 14);

    match (fast, slow) {
        (Ok(fast), Ok(slow)) if slow != Decimal::ZERO => {
            let spread = (fast - slow) / slow;
            let direction = if spread > dec!(0.001) {
                SignalDirection::Buy
            } else if spread < -dec!(0.001) {
                SignalDirection::Sell
            } else {
                SignalDirection::Hold
            };
            GlobalSubSignal {
                direction,
                strength: clamp_unit(spread * dec!(20)).abs(),
                momentum: momentum.unwrap_or(dec!(50)),
            }
        }
        _ => GlobalSubSignal { direction: SignalDirection::Hold, strength: Decimal::ZERO, momentum: dec!(50) },
    }
}

/// Currency-risk read over the USD/TRY series: bucketed volatility plus the
/// position-size multiplier the simulation engine applies on top of its
/// own risk budget.
fn currency_sub_signal(usd_try_candles: &[Candle]) -> CurrencySubSignal {
    use crate::domain::indicators::atr::atr;

    let Ok(atr_out) = atr(usd_try_candles, 14) else {
        return CurrencySubSignal { risk_level: CurrencyRiskLevel::Medium, position_size_multiplier: Decimal::ONE };
    };

    let level = VolatilityRegime::bucket(atr_out.atr_pct);
    let (risk_level, multiplier) = match level {
        crate::domain::market::regime::VolatilityLevel::VeryLow => (CurrencyRiskLevel::Low, dec!(1.3)),
        crate::domain::market::regime::VolatilityLevel::Low => (CurrencyRiskLevel::Low, dec!(1.1)),
        crate::domain::market::regime::VolatilityLevel::Medium => (CurrencyRiskLevel::Medium, Decimal::ONE),
        crate::domain::market::regime::VolatilityLevel::High => (CurrencyRiskLevel::High, dec!(0.6)),
        crate::domain::market::regime::VolatilityLevel::Extreme => (CurrencyRiskLevel::Extreme, dec!(0.3)),
    };
    CurrencySubSignal { risk_level, position_size_multiplier: multiplier }
}

/// Runs the full six-step hybrid analysis for one timeframe: indicators,
/// parallel sub-analyzers, the three sub-signals, then fusion via the
/// signal combiner.
pub fn analyze(timeframe: Timeframe, snapshot: &MarketSnapshot, thresholds: &signal_combiner::Thresholds) -> (AnalysisRecord, Option<SignalRecord>) {
    let gram_candles = &snapshot.gram_candles;
    if gram_candles.len() < MIN_GRAM_CANDLES {
        let reason = format!("need at least {MIN_GRAM_CANDLES} gram candles, got {}", gram_candles.len());
        let close = gram_candles.last().map(|c| c.close).unwrap_or_default();
        let analysis = AnalysisRecord::new(
            timeframe,
            snapshot.latest.ts,
            close,
            SignalDirection::Hold,
            Decimal::ZERO,
            SignalStrength::Weak,
            Decimal::ZERO,
            None,
            None,
            Decimal::ZERO,
            Direction::Flat,
            CurrencyRiskLevel::Medium,
            vec![SubAnalysis::insufficient("hybrid_strategy", reason.clone())],
            format!("hold: insufficient_data ({reason})"),
            vec!["wait_for_more_candles".to_string()],
        );
        return (analysis, None);
    }

    let sub_analyses = analysis::analyze_all(gram_candles);
    let gram = gram_sub_signal(gram_candles);
    let global = global_sub_signal(&snapshot.ounce_usd_candles);
    let currency = currency_sub_signal(&snapshot.usd_try_candles);

    let close = gram_candles.last().map(|c| c.close).unwrap_or_default();
    let ts = snapshot.latest.ts;

    let inputs = CombinerInputs {
        timeframe,
        ts,
        close,
        gram,
        global,
        currency,
        sub_analyses,
    };

    signal_combiner::combine(inputs, thresholds)
}
