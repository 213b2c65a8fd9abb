//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
///
/// Amounts are decimal, never floating point, so cart totals stay exact.
/// The marketplace backend stores bare numeric prices; the currency code is
/// attached client-side when a price is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., shillings, not cents).
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

    /// A price in the default marketplace currency.
    #[must_use]
    pub fn from_amount(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::default())
    }

    /// Multiply by a quantity, e.g. for a cart line total.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    KES,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// The symbol prefixed to displayed amounts.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD => "$",
            Self::KES => "KSh ",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// The ISO 4217 code as a string.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::KES => "KES",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_display_pads_to_two_decimals() {
        let price = Price::from_amount(Decimal::new(125, 1)); // 12.5
        assert_eq!(price.display(), "$12.50");
    }

    #[test]
    fn test_display_rounds_to_two_decimals() {
        let price = Price::from_amount(Decimal::new(19999, 3)); // 19.999
        assert_eq!(price.display(), "$20.00");
    }

    #[test]
    fn test_times_quantity() {
        let price = Price::from_amount(Decimal::new(250, 2)); // 2.50
        assert_eq!(price.times(3).amount, Decimal::new(750, 2));
    }

    #[test]
    fn test_kes_symbol() {
        let price = Price::new(Decimal::new(100, 0), CurrencyCode::KES);
        assert_eq!(price.display(), "KSh 100.00");
    }

    #[test]
    fn test_default_currency() {
        assert_eq!(CurrencyCode::default().code(), "USD");
    }
}
