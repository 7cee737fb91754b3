//! Minor-unit money conversions.
//!
//! Stripe reports amounts in minor units (cents for USD) while the database
//! stores `NUMERIC(12,2)` decimals. These helpers are the only place the two
//! representations meet; floats never touch money.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Convert a gateway minor-unit amount into a major-unit decimal.
///
/// `1999` cents becomes `19.99`.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Convert a major-unit decimal into gateway minor units, rounding half-up
/// at the cent.
///
/// `19.99` becomes `1999`; `10.005` becomes `1001`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> i64 {
    let cents = (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    cents.to_i64().unwrap_or(0)
}
