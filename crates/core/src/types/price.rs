//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price from an amount in the store's default currency.
    #[must_use]
    pub fn from_amount(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::default())
    }

    /// Create a price from minor units (e.g. cents).
    #[must_use]
    pub fn from_cents(cents: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(cents, 2), currency_code)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    INR,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::INR => "₹",
        }
    }
}
