//! Decimal money helpers.
//!
//! Amounts are carried unrounded through arithmetic and rounded once, to
//! cents, when persisted.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places stored for currency amounts.
pub const CURRENCY_DECIMAL_PLACES: u32 = 2;

/// Round a currency amount to cents, half away from zero.
///
/// ```
/// use rust_decimal::Decimal;
/// use stockroom_core::round_currency;
///
/// assert_eq!(round_currency(Decimal::new(1005, 3)), Decimal::new(101, 2));
/// ```
#[must_use]
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(
        CURRENCY_DECIMAL_PLACES,
        RoundingStrategy::MidpointAwayFromZero,
    )
}

/// How many units of the source currency one US dollar buys.
///
/// Only positive rates exist; a zero or negative rate is treated as "no rate".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRate(Decimal);

impl ExchangeRate {
    /// Create a rate, returning `None` unless it is strictly positive.
    #[must_use]
    pub fn new(usd_to_source: Decimal) -> Option<Self> {
        (usd_to_source > Decimal::ZERO).then_some(Self(usd_to_source))
    }

    /// The underlying source-per-USD value.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Convert a source-currency amount to USD, unrounded.
    #[must_use]
    pub fn to_usd(self, source_amount: Decimal) -> Decimal {
        source_amount / self.0
    }
}
