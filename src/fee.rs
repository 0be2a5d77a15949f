use rust_decimal::{Decimal, RoundingStrategy};

use crate::account::BALANCE_SCALE;

/// Flat percentage fee charged on the debit leg of a transfer.
///
/// Passed into the engine explicitly, so tests can vary the rate and the
/// engine carries no hidden process-wide constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    rate: Decimal,
}

impl FeePolicy {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    /// `round(amount * rate, 4, HALF_UP)`, always in the currency of
    /// `amount`. Pure; callers guarantee a non-negative amount.
    pub fn fee_for(&self, amount: Decimal) -> Decimal {
        (amount * self.rate).round_dp_with_strategy(BALANCE_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl Default for FeePolicy {
    /// The system-wide 1% transaction fee.
    fn default() -> Self {
        Self { rate: Decimal::new(1, 2) }
    }
}
