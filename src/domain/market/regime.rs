use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trend classification derived from ADX strength and directional bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendRegimeType {
    Trending,
    Ranging,
    Transitioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendRegime {
    pub regime_type: TrendRegimeType,
    pub direction: Direction,
    pub adx: Decimal,
    pub strength: Decimal,
}

impl TrendRegime {
    /// Classifies ADX into regimes: <15 ranging, 15-25 transitioning,
    /// >25 trending.
    pub fn from_adx(adx: Decimal, direction: Direction) -> Self {
        use rust_decimal_macros::dec;
        let regime_type = if adx < dec!(15) {
            TrendRegimeType::Ranging
        } else if adx <= dec!(25) {
            TrendRegimeType::Transitioning
        } else {
            TrendRegimeType::Trending
        };
        let strength = (adx / dec!(50)).min(Decimal::ONE);
        Self {
            regime_type,
            direction,
            adx,
            strength,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityLevel {
    VeryLow,
    Low,
    Medium,
    High,
    Extreme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityRegime {
    pub level: VolatilityLevel,
    pub atr: Decimal,
    pub atr_pct: Decimal,
    pub expanding: bool,
    pub contracting: bool,
    pub squeeze_potential: bool,
}

impl VolatilityRegime {
    /// Buckets ATR%. Boundaries chosen so the default volatility gate
    /// (0.5%) sits inside `Low`.
    pub fn bucket(atr_pct: Decimal) -> VolatilityLevel {
        use rust_decimal_macros::dec;
        if atr_pct < dec!(0.2) {
            VolatilityLevel::VeryLow
        } else if atr_pct < dec!(0.6) {
            VolatilityLevel::Low
        } else if atr_pct < dec!(1.2) {
            VolatilityLevel::Medium
        } else if atr_pct < dec!(2.5) {
            VolatilityLevel::High
        } else {
            VolatilityLevel::Extreme
        }
    }

    pub fn new(atr: Decimal, atr_pct: Decimal, atr_pct_prev: Option<Decimal>) -> Self {
        let level = Self::bucket(atr_pct);
        let expanding = atr_pct_prev.is_some_and(|prev| atr_pct > prev);
        let contracting = atr_pct_prev.is_some_and(|prev| atr_pct < prev);
        Self {
            level,
            atr,
            atr_pct,
            expanding,
            contracting,
            squeeze_potential: matches!(level, VolatilityLevel::VeryLow | VolatilityLevel::Low),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumState {
    Accelerating,
    Stable,
    Decelerating,
    Exhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumRegime {
    pub state: MomentumState,
    pub alignment: bool,
}

impl MomentumRegime {
    /// Derives momentum state from the MACD-histogram progression and
    /// whether RSI agrees with histogram direction.
    pub fn from_histogram_progression(hist_recent: &[Decimal], rsi: Decimal) -> Self {
        use rust_decimal_macros::dec;
        if hist_recent.len() < 2 {
            return Self {
                state: MomentumState::Stable,
                alignment: false,
            };
        }
        let last = hist_recent[hist_recent.len() - 1];
        let prev = hist_recent[hist_recent.len() - 2];
        let rising_hist = last > prev;
        let shrinking_magnitude = last.abs() < prev.abs();

        let state = if last.abs() > prev.abs() && rising_hist == (last > Decimal::ZERO) {
            MomentumState::Accelerating
        } else if shrinking_magnitude && last.signum() == prev.signum() {
            MomentumState::Decelerating
        } else if last.signum() != prev.signum() && prev.abs() > dec!(0) {
            MomentumState::Exhausted
        } else {
            MomentumState::Stable
        };

        let alignment = (last > Decimal::ZERO && rsi > dec!(50))
            || (last < Decimal::ZERO && rsi < dec!(50));

        Self { state, alignment }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trend_regime_classifies_adx_buckets() {
        assert_eq!(
            TrendRegime::from_adx(dec!(10), Direction::Up).regime_type,
            TrendRegimeType::Ranging
        );
        assert_eq!(
            TrendRegime::from_adx(dec!(20), Direction::Up).regime_type,
            TrendRegimeType::Transitioning
        );
        assert_eq!(
            TrendRegime::from_adx(dec!(30), Direction::Up).regime_type,
            TrendRegimeType::Trending
        );
    }

    #[test]
    fn volatility_bucket_below_min_threshold_is_low_or_very_low() {
        let level = VolatilityRegime::bucket(dec!(0.3));
        assert!(matches!(level, VolatilityLevel::VeryLow | VolatilityLevel::Low));
    }

    #[test]
    fn volatility_bucket_above_min_threshold_is_medium_or_above() {
        let level = VolatilityRegime::bucket(dec!(0.8));
        assert!(matches!(
            level,
            VolatilityLevel::Medium | VolatilityLevel::High | VolatilityLevel::Extreme
        ));
    }

    #[test]
    fn momentum_alignment_true_when_histogram_and_rsi_agree() {
        let m = MomentumRegime::from_histogram_progression(&[dec!(0.1), dec!(0.2)], dec!(60));
        assert!(m.alignment);
    }
}
