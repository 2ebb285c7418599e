//! Pricing

use std::fmt::Debug;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Money, iso};
use serde::Serialize;

/// Shipping and tax policy applied on top of a cart subtotal.
pub trait RateCalculator: Debug + Send + Sync {
    /// Shipping charge for the given subtotal.
    fn shipping(&self, subtotal: Decimal) -> Decimal;

    /// Tax charge for the given subtotal.
    fn tax(&self, subtotal: Decimal) -> Decimal;
}

/// Current business policy: shipping and tax are both free.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroRates;

impl RateCalculator for ZeroRates {
    fn shipping(&self, _subtotal: Decimal) -> Decimal {
        Decimal::ZERO
    }

    fn tax(&self, _subtotal: Decimal) -> Decimal {
        Decimal::ZERO
    }
}

/// Breakdown of an order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Sum of line totals
    pub subtotal: Decimal,

    /// Shipping charge
    pub shipping: Decimal,

    /// Tax charge
    pub tax: Decimal,

    /// Amount to charge: subtotal + shipping + tax
    pub total: Decimal,
}

impl Totals {
    /// Apply a rate policy to a subtotal.
    ///
    /// Every component is rounded to whole cents, so `total` is exactly the
    /// amount a payment gateway is asked to charge.
    pub fn calculate(subtotal: Decimal, rates: &dyn RateCalculator) -> Self {
        let shipping = round_to_cents(rates.shipping(subtotal));
        let tax = round_to_cents(rates.tax(subtotal));
        let subtotal = round_to_cents(subtotal);

        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal.saturating_add(shipping).saturating_add(tax),
        }
    }

    /// Whether there is anything to charge.
    pub fn is_payable(&self) -> bool {
        self.total > Decimal::ZERO
    }
}

/// Round an amount to whole cents, half away from zero.
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount for display in the store currency.
pub fn format_money(amount: Decimal) -> String {
    Money::from_minor(to_minor_units(amount), iso::USD).to_string()
}

/// Convert an amount into whole cents, rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> i64 {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|cents| cents.to_i64())
        .unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FlatShipping;

    impl RateCalculator for FlatShipping {
        fn shipping(&self, _subtotal: Decimal) -> Decimal {
            Decimal::new(499, 2)
        }

        fn tax(&self, subtotal: Decimal) -> Decimal {
            subtotal / Decimal::TEN
        }
    }

    #[test]
    fn zero_rates_total_equals_subtotal() {
        let totals = Totals::calculate(Decimal::new(130, 0), &ZeroRates);

        assert_eq!(totals.total, Decimal::new(130, 0));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
    }

    #[test]
    fn custom_rates_are_added_to_total() {
        let totals = Totals::calculate(Decimal::new(100, 0), &FlatShipping);

        assert_eq!(totals.total, Decimal::new(11499, 2));
    }

    #[test]
    fn totals_are_rounded_to_cents_once() {
        let totals = Totals::calculate(Decimal::new(19_995, 3), &FlatShipping);

        assert_eq!(totals.subtotal, Decimal::new(2000, 2));
        assert_eq!(totals.tax, Decimal::new(200, 2));
        assert_eq!(totals.total, Decimal::new(2699, 2));
        assert_eq!(totals.total.scale(), 2);
    }

    #[test]
    fn free_cart_is_not_payable() {
        assert!(!Totals::calculate(Decimal::ZERO, &ZeroRates).is_payable());
        assert!(Totals::calculate(Decimal::new(1, 2), &ZeroRates).is_payable());
    }

    #[test]
    fn minor_units_round_half_away_from_zero() {
        assert_eq!(to_minor_units(Decimal::new(12345, 3)), 1235);
        assert_eq!(to_minor_units(Decimal::new(50, 0)), 5000);
    }

    #[test]
    fn format_money_uses_store_currency() {
        let formatted = format_money(Decimal::new(13000, 2));

        assert!(formatted.contains("130"), "unexpected format: {formatted}");
        assert!(formatted.contains('$'), "unexpected format: {formatted}");
    }
}
