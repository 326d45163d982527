pub mod divergence;
pub mod fibonacci;
pub mod patterns;
pub mod regime_detector;
pub mod smart_money;
pub mod structure;
pub mod swing;

use crate::domain::analysis::sub_analysis::SubAnalysis;
use crate::domain::market::candle::Candle;

/// Runs every sub-analyzer over the same candle window. Each analyzer is a
/// pure function and none of them can panic; a failure mode always comes
/// back as a tagged `InsufficientData` variant instead.
pub fn analyze_all(candles: &[Candle]) -> Vec<SubAnalysis> {
    let mut out = regime_detector::analyze_all(candles);
    out.push(divergence::analyze(candles));
    out.push(structure::analyze(candles));
    out.push(fibonacci::analyze(candles));
    out.push(smart_money::analyze(candles));
    out.push(patterns::analyze(candles));
    out
}
