use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A `Decimal` clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Confidence(Decimal);

impl Confidence {
    pub fn new(value: Decimal) -> Self {
        Self(value.clamp(Decimal::ZERO, Decimal::ONE))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl std::ops::Mul<Decimal> for Confidence {
    type Output = Confidence;
    fn mul(self, rhs: Decimal) -> Confidence {
        Confidence::new(self.0 * rhs)
    }
}

impl std::ops::Add for Confidence {
    type Output = Confidence;
    fn add(self, rhs: Confidence) -> Confidence {
        Confidence::new(self.0 + rhs.0)
    }
}
