use crate::domain::analysis::sub_analysis::SubAnalysis;
use crate::domain::errors::EngineError;
use crate::domain::indicators::adx::adx;
use crate::domain::indicators::atr::atr;
use crate::domain::indicators::macd::macd;
use crate::domain::indicators::rsi::rsi;
use crate::domain::market::candle::Candle;
use crate::domain::market::regime::{Direction, MomentumRegime, TrendRegime, VolatilityRegime};

fn insufficient(analyzer: &str, e: EngineError) -> SubAnalysis {
    SubAnalysis::insufficient(analyzer, e.to_string())
}

pub fn trend(candles: &[Candle]) -> SubAnalysis {
    let adx_out = match adx(candles, 14) {
        Ok(v) => v,
        Err(e) => return insufficient("trend_regime", e),
    };
    let direction = if adx_out.plus_di > adx_out.minus_di {
        Direction::Up
    } else if adx_out.minus_di > adx_out.plus_di {
        Direction::Down
    } else {
        Direction::Flat
    };
    SubAnalysis::TrendRegime(TrendRegime::from_adx(adx_out.adx, direction))
}

pub fn volatility(candles: &[Candle], prev_candles: Option<&[Candle]>) -> SubAnalysis {
    let atr_out = match atr(candles, 14) {
        Ok(v) => v,
        Err(e) => return insufficient("volatility_regime", e),
    };
    let atr_pct_prev = prev_candles.and_then(|prev| atr(prev, 14).ok()).map(|o| o.atr_pct);
    SubAnalysis::VolatilityRegime(VolatilityRegime::new(atr_out.atr, atr_out.atr_pct, atr_pct_prev))
}

pub fn momentum(candles: &[Candle]) -> SubAnalysis {
    let rsi_value = match rsi(candles, 14) {
        Ok(v) => v,
        Err(e) => return insufficient("momentum_regime", e),
    };
    let macd_out = match macd(candles, 12, 26, 9) {
        Ok(v) => v,
        Err(e) => return insufficient("momentum_regime", e),
    };

    let mut hist_recent = Vec::with_capacity(2);
    if candles.len() > 1 {
        if let Ok(prev) = macd(&candles[..candles.len() - 1], 12, 26, 9) {
            hist_recent.push(prev.histogram);
        }
    }
    hist_recent.push(macd_out.histogram);

    SubAnalysis::MomentumRegime(MomentumRegime::from_histogram_progression(&hist_recent, rsi_value))
}

/// Convenience bundle running all three regime reads. The scheduler treats
/// each entry independently so one insufficient-data read never suppresses
/// the others.
pub fn analyze_all(candles: &[Candle]) -> Vec<SubAnalysis> {
    let prev = if candles.len() > 1 { Some(&candles[..candles.len() - 1]) } else { None };
    vec![trend(candles), volatility(candles, prev), momentum(candles)]
}
