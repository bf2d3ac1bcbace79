//! Shared type definitions and newtypes

use serde::{Deserialize, Serialize};

/// Point amount (for clarity in function signatures)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Points(pub i64);

impl Points {
    pub fn new(amount: i64) -> Self {
        Points(amount)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Convert to a currency amount at the configured rate
    pub fn to_currency(&self, rate: f64) -> Currency {
        Currency(self.0 as f64 * rate)
    }

    /// Referral commission at the given rate, floored to whole points
    pub fn commission(&self, rate: f64) -> Points {
        Points((self.0 as f64 * rate).floor() as i64)
    }
}

/// Payout currency amount (for clarity in function signatures)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Currency(pub f64);

impl Currency {
    pub fn new(amount: f64) -> Self {
        Currency(amount)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }
}
